//! Worker communication
//!
//! Assembly needs exactly one collective: the root rank derives the trial
//! seed offset and every other rank receives it before generating feeds,
//! followed by a barrier. Everything else is computed locally.

use std::sync::{Arc, Barrier};
use std::thread;

use crossbeam::channel::{bounded, Receiver, Sender};

use crate::error::{NetError, Result};

/// Rank that derives and broadcasts shared values
pub const ROOT_RANK: usize = 0;

/// Collective operations available to a worker
pub trait Communicator: Send + Sync {
    /// Rank of this worker
    fn rank(&self) -> usize;

    /// Number of workers
    fn size(&self) -> usize;

    /// Broadcast a value from the root; the argument is ignored elsewhere
    fn broadcast_u64(&self, value: u64) -> Result<u64>;

    /// Block until every worker has arrived
    fn barrier(&self) -> Result<()>;

    /// True on the root rank
    fn is_root(&self) -> bool {
        self.rank() == ROOT_RANK
    }
}

/// The only worker of a serial run
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleProcess;

impl Communicator for SingleProcess {
    fn rank(&self) -> usize {
        ROOT_RANK
    }

    fn size(&self) -> usize {
        1
    }

    fn broadcast_u64(&self, value: u64) -> Result<u64> {
        Ok(value)
    }

    fn barrier(&self) -> Result<()> {
        Ok(())
    }
}

/// Handle of one worker in a [`LocalCluster`]
#[derive(Debug)]
pub struct ClusterComm {
    rank: usize,
    size: usize,
    barrier: Arc<Barrier>,
    outbox: Vec<Sender<u64>>,
    inbox: Option<Receiver<u64>>,
}

impl Communicator for ClusterComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn broadcast_u64(&self, value: u64) -> Result<u64> {
        match &self.inbox {
            None => {
                for tx in &self.outbox {
                    tx.send(value).map_err(|_| {
                        NetError::communication(self.rank, "receiver hung up before broadcast")
                    })?;
                }
                Ok(value)
            }
            Some(rx) => rx
                .recv()
                .map_err(|_| NetError::communication(self.rank, "root hung up before broadcast")),
        }
    }

    fn barrier(&self) -> Result<()> {
        self.barrier.wait();
        Ok(())
    }
}

/// In-process cluster of workers running on threads
pub struct LocalCluster;

impl LocalCluster {
    /// Create connected handles for `size` workers, indexed by rank
    pub fn handles(size: usize) -> Result<Vec<ClusterComm>> {
        if size == 0 {
            return Err(NetError::invalid_parameter("ranks", "0", ">= 1"));
        }
        let barrier = Arc::new(Barrier::new(size));
        let mut outbox = Vec::with_capacity(size - 1);
        let mut handles = Vec::with_capacity(size);
        for rank in 1..size {
            // one value in flight per trial
            let (tx, rx) = bounded(1);
            outbox.push(tx);
            handles.push(ClusterComm {
                rank,
                size,
                barrier: Arc::clone(&barrier),
                outbox: Vec::new(),
                inbox: Some(rx),
            });
        }
        handles.insert(
            ROOT_RANK,
            ClusterComm {
                rank: ROOT_RANK,
                size,
                barrier,
                outbox,
                inbox: None,
            },
        );
        Ok(handles)
    }

    /// Run `worker` on every rank and collect the results in rank order
    pub fn run<F, T>(size: usize, worker: F) -> Result<Vec<T>>
    where
        F: Fn(ClusterComm) -> Result<T> + Sync,
        T: Send,
    {
        let handles = Self::handles(size)?;
        let worker = &worker;
        thread::scope(|scope| {
            let joins: Vec<_> = handles
                .into_iter()
                .map(|comm| {
                    let rank = comm.rank;
                    (rank, scope.spawn(move || worker(comm)))
                })
                .collect();
            joins
                .into_iter()
                .map(|(rank, join)| {
                    join.join()
                        .map_err(|_| NetError::communication(rank, "worker thread panicked"))?
                })
                .collect()
        })
    }
}
