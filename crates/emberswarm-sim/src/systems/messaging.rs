//! Messaging step: event-triggered telemetry emission, lossy broadcast over
//! the modeled channel, and latency-delayed delivery.
//!
//! Messages emitted on tick N with latency L are delivered on the earliest
//! tick M with M*dt >= N*dt + L. Deliveries due at the same instant arrive
//! in sender-id order (enqueue order as the final tie-break), so delivery is
//! fully deterministic.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use std::cmp::Reverse;

use hecs::{Entity, World};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use emberswarm_core::config::SimulationConfig;
use emberswarm_core::error::KernelError;
use emberswarm_core::messages::{MessagePayload, SwarmMessage, Telemetry};
use emberswarm_core::types::Position;

use crate::channel::ChannelTable;
use crate::engine::AgentRuntime;
use crate::systems::metrics::TickCounters;

/// A message waiting for its delivery time.
#[derive(Debug, Clone)]
struct PendingDelivery {
    deliver_time_s: f64,
    sender_id: u32,
    seq: u64,
    receiver_id: u32,
    message: SwarmMessage,
}

impl PartialEq for PendingDelivery {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PendingDelivery {}

impl PartialOrd for PendingDelivery {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingDelivery {
    fn cmp(&self, other: &Self) -> Ordering {
        self.deliver_time_s
            .total_cmp(&other.deliver_time_s)
            .then_with(|| self.sender_id.cmp(&other.sender_id))
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// In-process message bus with per-receiver loss draws and a delivery queue
/// ordered by (deliver_time, sender_id).
#[derive(Debug, Clone)]
pub struct MessageBus {
    rng: ChaCha8Rng,
    pending: BinaryHeap<Reverse<PendingDelivery>>,
    seq: u64,
}

impl MessageBus {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            pending: BinaryHeap::new(),
            seq: 0,
        }
    }

    /// Offer a message to one receiver across a lossy link. Draws the
    /// delivery probability at emission time; returns whether it survived.
    pub fn offer_lossy(
        &mut self,
        receiver_id: u32,
        message: SwarmMessage,
        packet_loss_prob: f64,
    ) -> bool {
        let dropped = self.rng.gen_range(0.0..1.0) < packet_loss_prob;
        if !dropped {
            self.push(receiver_id, message);
        }
        !dropped
    }

    /// Enqueue over the reliable command path (no loss draw).
    pub fn push_reliable(&mut self, receiver_id: u32, message: SwarmMessage) {
        self.push(receiver_id, message);
    }

    fn push(&mut self, receiver_id: u32, message: SwarmMessage) {
        self.seq += 1;
        self.pending.push(Reverse(PendingDelivery {
            deliver_time_s: message.deliver_time_s,
            sender_id: message.sender_id,
            seq: self.seq,
            receiver_id,
            message,
        }));
    }

    /// Pop every message due at or before `now`, in delivery order.
    pub fn drain_due(&mut self, now_s: f64) -> Vec<(u32, SwarmMessage)> {
        let mut due = Vec::new();
        while let Some(Reverse(head)) = self.pending.peek() {
            if head.deliver_time_s > now_s + 1e-9 {
                break;
            }
            let Reverse(delivery) = self.pending.pop().expect("peeked entry vanished");
            due.push((delivery.receiver_id, delivery.message));
        }
        due
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Run the messaging step.
pub fn run(
    world: &mut World,
    entities: &BTreeMap<u32, Entity>,
    agents: &mut BTreeMap<u32, AgentRuntime>,
    channel: &mut ChannelTable,
    bus: &mut MessageBus,
    config: &SimulationConfig,
    now_s: f64,
    extra_outbound: Vec<SwarmMessage>,
    counters: &mut TickCounters,
) -> Result<(), KernelError> {
    // Gather per-drone source state in id order.
    let mut sources: BTreeMap<u32, (Position, Telemetry)> = BTreeMap::new();
    for (&id, &entity) in entities {
        let (pose, velocity, state, battery, payload) = world
            .query_one_mut::<(
                &emberswarm_core::types::Position,
                &emberswarm_core::types::Velocity,
                &emberswarm_core::enums::DroneState,
                &emberswarm_core::components::Battery,
                &emberswarm_core::components::Payload,
            )>(entity)
            .map_err(|_| {
                KernelError::InvariantViolation(format!("drone {id} lost its components"))
            })?;
        sources.insert(
            id,
            (
                *pose,
                Telemetry {
                    pose: *pose,
                    velocity: *velocity,
                    battery_percent: battery.percent(),
                    payload_remaining: payload.remaining_units,
                    state: *state,
                },
            ),
        );
    }

    // Event-triggered telemetry decisions, in id order.
    let mut outbound: Vec<SwarmMessage> = Vec::new();
    for (&id, &(pose, telemetry)) in &sources {
        let agent = agents
            .get_mut(&id)
            .ok_or_else(|| KernelError::InvariantViolation(format!("drone {id} has no agent")))?;
        let decision = agent.etm.decide(now_s, pose);
        if decision.transmit {
            agent.etm.record_transmission(now_s, pose);
            counters.transmissions += 1;
            outbound.push(SwarmMessage {
                sender_id: id,
                send_time_s: now_s,
                deliver_time_s: now_s,
                payload: MessagePayload::Telemetry(telemetry),
            });
        } else {
            counters.triggers_suppressed += 1;
        }
    }
    outbound.extend(extra_outbound);

    // Broadcast over the lossy RF medium: per-receiver loss draw and
    // per-link latency, receivers visited in id order.
    for message in outbound {
        let sender = message.sender_id;
        let Some(&(sender_pose, _)) = sources.get(&sender) else {
            continue;
        };
        for (&receiver, &(receiver_pose, _)) in &sources {
            if receiver == sender {
                continue;
            }
            let distance = sender_pose.range_to(&receiver_pose);
            let link = channel.ensure(sender, receiver, distance, now_s);
            let mut delivery = message.clone();
            delivery.deliver_time_s = now_s + link.latency_s;
            counters.messages_offered += 1;
            if !bus.offer_lossy(receiver, delivery, link.packet_loss_prob) {
                counters.messages_dropped += 1;
            }
        }
    }

    // Deliver everything due this tick.
    for (receiver, message) in bus.drain_due(now_s) {
        counters.messages_delivered += 1;
        let Some(agent) = agents.get_mut(&receiver) else {
            continue;
        };
        match message.payload {
            MessagePayload::Telemetry(telemetry) => {
                agent.observer.update(
                    message.sender_id,
                    message.send_time_s,
                    now_s,
                    telemetry.pose,
                    telemetry.velocity,
                );
            }
            MessagePayload::FireDetection { x_m, y_m, .. } => {
                agent.known_fire = Some(Position::new(
                    x_m,
                    y_m,
                    config.swarm.takeoff_altitude_m,
                ));
            }
            MessagePayload::Suppression { .. } => {
                // Informational; folded into swarm metrics only.
            }
            MessagePayload::Command { command } => {
                agent.pending_command = Some(command);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use emberswarm_core::messages::MessagePayload;

    fn message(sender: u32, send: f64, deliver: f64) -> SwarmMessage {
        SwarmMessage {
            sender_id: sender,
            send_time_s: send,
            deliver_time_s: deliver,
            payload: MessagePayload::FireDetection {
                x_m: 0.0,
                y_m: 0.0,
                intensity: 1.0,
            },
        }
    }

    #[test]
    fn test_delivery_order_time_then_sender() {
        let mut bus = MessageBus::new(1);
        bus.push_reliable(9, message(5, 0.0, 0.30));
        bus.push_reliable(9, message(2, 0.0, 0.30));
        bus.push_reliable(9, message(1, 0.0, 0.10));

        let due = bus.drain_due(0.5);
        let senders: Vec<u32> = due.iter().map(|(_, m)| m.sender_id).collect();
        assert_eq!(senders, vec![1, 2, 5]);
    }

    #[test]
    fn test_messages_wait_for_deliver_time() {
        let mut bus = MessageBus::new(1);
        bus.push_reliable(3, message(1, 0.0, 0.25));
        assert!(bus.drain_due(0.2).is_empty());
        assert_eq!(bus.pending_len(), 1);
        assert_eq!(bus.drain_due(0.25).len(), 1);
    }

    #[test]
    fn test_guaranteed_drop_at_loss_probability_one() {
        let mut bus = MessageBus::new(1);
        for _ in 0..100 {
            assert!(!bus.offer_lossy(2, message(1, 0.0, 0.1), 1.0));
        }
        assert_eq!(bus.pending_len(), 0);
    }

    #[test]
    fn test_lossless_offer_always_survives() {
        let mut bus = MessageBus::new(1);
        for _ in 0..100 {
            assert!(bus.offer_lossy(2, message(1, 0.0, 0.1), 0.0));
        }
        assert_eq!(bus.pending_len(), 100);
    }

    #[test]
    fn test_loss_draws_are_seeded() {
        let outcomes = |seed: u64| {
            let mut bus = MessageBus::new(seed);
            (0..200)
                .map(|_| bus.offer_lossy(2, message(1, 0.0, 0.1), 0.5))
                .collect::<Vec<_>>()
        };
        assert_eq!(outcomes(42), outcomes(42));
        assert_ne!(outcomes(42), outcomes(43));
    }
}
