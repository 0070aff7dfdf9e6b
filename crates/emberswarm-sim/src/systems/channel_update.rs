//! Channel update step: recompute RSSI, latency, and loss for every active
//! directed pair.
//!
//! Pairs are visited in (sender, receiver) id order so the fading RNG draws
//! the same sequence every run.

use std::collections::BTreeMap;

use hecs::{Entity, World};

use emberswarm_core::error::KernelError;
use emberswarm_core::types::Position;

use crate::channel::ChannelTable;

/// Update all directed links between registered drones.
pub fn run(
    world: &mut World,
    entities: &BTreeMap<u32, Entity>,
    channel: &mut ChannelTable,
    now_s: f64,
) -> Result<(), KernelError> {
    let mut positions: Vec<(u32, Position)> = Vec::with_capacity(entities.len());
    for (&id, &entity) in entities {
        let pose = world.query_one_mut::<&Position>(entity).map_err(|_| {
            KernelError::InvariantViolation(format!("drone {id} lost its position"))
        })?;
        positions.push((id, *pose));
    }

    for &(sender, sender_pose) in &positions {
        for &(receiver, receiver_pose) in &positions {
            if sender == receiver {
                continue;
            }
            channel.update(sender, receiver, sender_pose.range_to(&receiver_pose), now_s);
        }
    }

    Ok(())
}
