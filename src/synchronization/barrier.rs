use std::sync::Arc;

use log::{debug, trace};
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use tokio::sync::Barrier;

use super::Synchronizer;
use crate::error::{MlErr, Result};

/// Gradient entries reduced by a single task.
const CHUNK_SIZE: usize = 4096;

#[derive(Debug)]
struct Contribution {
    grad: Vec<f32>,
    loss: f32,
}

impl Contribution {
    fn new(size: usize) -> Self {
        Self {
            grad: vec![0.; size],
            loss: 0.,
        }
    }
}

#[derive(Debug)]
struct Group {
    barrier: Barrier,
    slots: Vec<Mutex<Contribution>>,
    reduced: RwLock<Contribution>,
}

/// Averages gradients across the members of a group using a barrier.
///
/// Every member writes its gradient to its own slot and waits. The barrier's leader sums the
/// slots in rank order, so the result doesn't depend on arrival order, and a second wait
/// releases every member to read the average back.
#[derive(Debug)]
pub struct BarrierSync {
    rank: usize,
    size: usize,
    group: Arc<Group>,
}

impl BarrierSync {
    /// Creates the members of a new group, one per rank, in rank order.
    ///
    /// # Arguments
    /// * `world_size` - The amount of members.
    /// * `size` - The length of the gradients that will be averaged.
    ///
    /// # Errors
    /// `MlErr::InvalidConfig` if `world_size` is zero.
    pub fn group(world_size: usize, size: usize) -> Result<Vec<Self>> {
        if world_size == 0 {
            return Err(MlErr::InvalidConfig("world size must be positive".into()));
        }

        let group = Arc::new(Group {
            barrier: Barrier::new(world_size),
            slots: (0..world_size)
                .map(|_| Mutex::new(Contribution::new(size)))
                .collect(),
            reduced: RwLock::new(Contribution::new(size)),
        });

        debug!(world_size = world_size, size = size; "created synchronization group");

        let members = (0..world_size)
            .map(|rank| Self {
                rank,
                size,
                group: group.clone(),
            })
            .collect();

        Ok(members)
    }

    /// Sums the slots in rank order and averages them, a chunk of the gradient per task.
    fn reduce(&self) {
        let slots: Vec<_> = self.group.slots.iter().map(|slot| slot.lock()).collect();
        let world_size = slots.len() as f32;

        let mut reduced = self.group.reduced.write();
        let Contribution { grad, loss } = &mut *reduced;

        grad.par_chunks_mut(CHUNK_SIZE)
            .enumerate()
            .for_each(|(i, chunk)| {
                let start = i * CHUNK_SIZE;
                chunk.fill(0.);

                for slot in &slots {
                    let part = &slot.grad[start..start + chunk.len()];
                    chunk.iter_mut().zip(part).for_each(|(r, g)| *r += g);
                }

                chunk.iter_mut().for_each(|r| *r /= world_size);
            });

        *loss = slots.iter().map(|slot| slot.loss).sum::<f32>() / world_size;
    }
}

impl Synchronizer for BarrierSync {
    fn rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.group.slots.len()
    }

    async fn step(&self, grad: &mut [f32], loss: f32) -> Result<f32> {
        if grad.len() != self.size {
            return Err(MlErr::SizeMismatch {
                what: "synchronized gradient",
                got: grad.len(),
                expected: self.size,
            });
        }

        {
            let mut slot = self.group.slots[self.rank].lock();
            slot.grad.copy_from_slice(grad);
            slot.loss = loss;
        }

        trace!(rank = self.rank; "waiting for the group");
        if self.group.barrier.wait().await.is_leader() {
            self.reduce();
        }

        self.group.barrier.wait().await;

        let reduced = self.group.reduced.read();
        grad.copy_from_slice(&reduced.grad);
        Ok(reduced.loss)
    }
}
