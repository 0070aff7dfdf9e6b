//! Simulation engine — the authoritative physics source.
//!
//! `SimulationEngine` owns the hecs world (canonical poses, batteries,
//! payloads), the fire grid, the RF channel table, and the message bus. It
//! is the only holder of the fire and channel randomness; agents are
//! deterministic functions of observed state plus their own exploration
//! RNGs. Each tick runs, in strict order: fire step, vehicle control,
//! channel update, messaging, energy, metrics.

use std::collections::{BTreeMap, VecDeque};

use hecs::{Entity, World};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use emberswarm_core::commands::{DroneCommand, SimCommand};
use emberswarm_core::components::{Battery, DroneIdentity, HomeDock, Odometer, Payload};
use emberswarm_core::config::SimulationConfig;
use emberswarm_core::enums::{DroneRole, DroneState, SimPhase};
use emberswarm_core::error::KernelError;
use emberswarm_core::messages::{MessagePayload, SwarmMessage};
use emberswarm_core::state::{LinkSnapshot, WorldSnapshot};
use emberswarm_core::types::{Position, SimTime, Velocity};
use emberswarm_fire::{FireGrid, SuppressionReceipt, Wind};

use emberswarm_agent::etm::{EtmController, EtmParams};
use emberswarm_agent::levy::LevyWalker;
use emberswarm_agent::observer::{NeighborObserver, ObserverParams};

use crate::channel::{ChannelParams, ChannelTable};
use crate::systems;
use crate::systems::messaging::MessageBus;
use crate::systems::metrics::{MetricsCollector, TickCounters};

/// Seed fan-out multiplier (golden-ratio constant).
const SEED_GOLDEN: u64 = 0x9e3779b97f4a7c15;

/// Sender id used for ground-station command messages on the bus.
const GROUND_STATION_ID: u32 = 0;

/// Bounded metrics history length.
const METRICS_HISTORY: usize = 1000;

fn subsystem_seed(master: u64, stream: u64) -> u64 {
    master.wrapping_add(stream).wrapping_mul(SEED_GOLDEN)
}

/// Behavior-private state owned by one drone agent: its event-trigger
/// controller, neighbor observer, exploration walker, and bookkeeping. The
/// engine never reaches into these except to run the agent's own step.
#[derive(Debug, Clone)]
pub struct AgentRuntime {
    pub id: u32,
    pub role: DroneRole,
    pub etm: EtmController,
    pub observer: NeighborObserver,
    pub walker: LevyWalker,
    /// Exploration/detection RNG, distinct from the engine RNGs.
    pub rng: ChaCha8Rng,
    pub waypoint: Option<Position>,
    pub known_fire: Option<Position>,
    pub pending_command: Option<DroneCommand>,
    pub formation_leader: Option<u32>,
    pub formation_offset: Option<(f64, f64)>,
    pub fires_detected: u64,
    pub suppression_ticks: u64,
}

/// The simulation engine. Owns all world state and subsystem randomness.
pub struct SimulationEngine {
    config: SimulationConfig,
    world: World,
    entities: BTreeMap<u32, Entity>,
    agents: BTreeMap<u32, AgentRuntime>,
    fire: FireGrid,
    fire_rng: ChaCha8Rng,
    channel: ChannelTable,
    bus: MessageBus,
    metrics: MetricsCollector,
    time: SimTime,
    phase: SimPhase,
    command_queue: VecDeque<SimCommand>,
}

impl SimulationEngine {
    /// Create an engine from a validated configuration. No drones are
    /// registered; see `world_setup::populate`.
    pub fn new(config: SimulationConfig) -> Self {
        let seed = config.sim.seed;
        let fire = FireGrid::new(
            config.fire.grid_width,
            config.fire.grid_height,
            config.fire.cell_size_m,
            config.fire.fuel_density,
            config.fire.spread_rate_mpm,
            config.fire.suppression_effectiveness,
        );
        let mut engine = Self {
            fire,
            fire_rng: ChaCha8Rng::seed_from_u64(subsystem_seed(seed, 1)),
            channel: ChannelTable::new(
                ChannelParams::from_section(&config.channel),
                subsystem_seed(seed, 2),
            ),
            bus: MessageBus::new(subsystem_seed(seed, 3)),
            metrics: MetricsCollector::new(METRICS_HISTORY),
            world: World::new(),
            entities: BTreeMap::new(),
            agents: BTreeMap::new(),
            time: SimTime::default(),
            phase: SimPhase::Idle,
            command_queue: VecDeque::new(),
            config,
        };
        engine.fire.set_wind(Wind::new(
            engine.config.fire.wind_speed_ms,
            engine.config.fire.wind_heading_rad,
        ));
        info!(seed, "simulation engine initialized");
        engine
    }

    // --- Registration ---

    /// Register a drone with the default follower role.
    pub fn register_drone(&mut self, id: u32, pose: Position) -> Result<(), KernelError> {
        self.register_drone_with_role(id, pose, DroneRole::Follower)
    }

    /// Register a drone with an explicit role. The record starts with full
    /// battery and payload, zero velocity, state Idle, and its dock at the
    /// initial pose projected to the ground.
    pub fn register_drone_with_role(
        &mut self,
        id: u32,
        pose: Position,
        role: DroneRole,
    ) -> Result<(), KernelError> {
        if id == 0 {
            return Err(KernelError::InvalidDroneId(id));
        }
        if self.entities.contains_key(&id) {
            return Err(KernelError::DuplicateId(id));
        }
        if !pose.is_finite() {
            return Err(KernelError::InvalidInput(format!(
                "drone {id} initial pose must be finite"
            )));
        }

        let entity = self.world.spawn((
            DroneIdentity { id, role },
            pose,
            Velocity::default(),
            DroneState::Idle,
            Battery::full(self.config.battery.capacity_mah, self.config.battery.voltage_v),
            Payload::full(self.config.battery.max_payload_units),
            HomeDock {
                position: Position::new(pose.x, pose.y, 0.0),
            },
            Odometer::default(),
        ));
        self.entities.insert(id, entity);

        let seed = self.config.sim.seed;
        self.agents.insert(
            id,
            AgentRuntime {
                id,
                role,
                etm: EtmController::new(EtmParams {
                    eta0_m: self.config.swarm.detm_eta0,
                    lambda_per_s: self.config.swarm.detm_lambda,
                    eta_min_m: self.config.swarm.detm_eta_min,
                    norm: self.config.swarm.detm_norm,
                }),
                observer: NeighborObserver::new(ObserverParams {
                    max_age_s: self.config.swarm.observer_max_age_s,
                    min_confidence: self.config.swarm.observer_min_confidence,
                }),
                walker: LevyWalker::new(
                    self.config.swarm.levy_alpha,
                    self.config.swarm.levy_step_scale_m,
                    subsystem_seed(seed, 100 + 2 * id as u64),
                ),
                rng: ChaCha8Rng::seed_from_u64(subsystem_seed(seed, 101 + 2 * id as u64)),
                waypoint: None,
                known_fire: None,
                pending_command: None,
                formation_leader: None,
                formation_offset: None,
                fires_detected: 0,
                suppression_ticks: 0,
            },
        );
        info!(drone = id, ?role, "drone registered");
        Ok(())
    }

    // --- Narrow typed write operations ---

    /// Ignite fire at world coordinates. The cell takes the maximum of its
    /// current and the requested intensity; a fuel-exhausted cell is an
    /// accepted no-op.
    pub fn ignite(&mut self, x_m: f64, y_m: f64, intensity: f64) -> Result<(), KernelError> {
        if !(intensity > 0.0 && intensity <= 1.0) || !intensity.is_finite() {
            return Err(KernelError::InvalidInput(format!(
                "ignition intensity {intensity} must lie in (0, 1]"
            )));
        }
        self.fire.ignite_world(x_m, y_m, intensity).map(|_| ())
    }

    /// Queue suppression at world coordinates; it takes effect in the next
    /// fire step, between spread and burndown.
    pub fn apply_suppression(
        &mut self,
        x_m: f64,
        y_m: f64,
        strength: f64,
    ) -> Result<SuppressionReceipt, KernelError> {
        if !(strength > 0.0 && strength <= 1.0) || !strength.is_finite() {
            return Err(KernelError::InvalidInput(format!(
                "suppression strength {strength} must lie in (0, 1]"
            )));
        }
        self.fire.queue_suppression_world(x_m, y_m, strength)
    }

    /// Set the uniform wind field.
    pub fn set_wind(&mut self, speed_ms: f64, heading_rad: f64) {
        self.fire.set_wind(Wind::new(speed_ms, heading_rad));
    }

    // --- Read queries ---

    /// Latest link state from drone `i` to drone `j`, by value. Unseen
    /// links are lazily computed from pure path loss at the current
    /// distance without consuming channel randomness. `i == j` reports the
    /// documented sentinel (maximum RSSI, zero latency).
    pub fn rssi(&mut self, i: u32, j: u32) -> Result<LinkSnapshot, KernelError> {
        let pose_i = self.pose(i)?;
        if i == j {
            return Ok(ChannelTable::self_link(i, self.time.elapsed_secs));
        }
        let pose_j = self.pose(j)?;
        Ok(self
            .channel
            .ensure(i, j, pose_i.range_to(&pose_j), self.time.elapsed_secs))
    }

    /// Fire intensity at world coordinates (0.0 off-grid).
    pub fn sample_intensity(&self, x_m: f64, y_m: f64) -> f64 {
        self.fire.sample_intensity(x_m, y_m).unwrap_or(0.0)
    }

    pub fn battery_percent(&self, id: u32) -> Result<f64, KernelError> {
        let entity = self.lookup(id)?;
        let mut query = self
            .world
            .query_one::<&Battery>(entity)
            .map_err(|_| KernelError::UnknownDrone(id))?;
        query
            .get()
            .map(|battery| battery.percent())
            .ok_or(KernelError::UnknownDrone(id))
    }

    pub fn pose(&self, id: u32) -> Result<Position, KernelError> {
        let entity = self.lookup(id)?;
        let mut query = self
            .world
            .query_one::<&Position>(entity)
            .map_err(|_| KernelError::UnknownDrone(id))?;
        query.get().copied().ok_or(KernelError::UnknownDrone(id))
    }

    pub fn drone_state(&self, id: u32) -> Result<DroneState, KernelError> {
        let entity = self.lookup(id)?;
        let mut query = self
            .world
            .query_one::<&DroneState>(entity)
            .map_err(|_| KernelError::UnknownDrone(id))?;
        query.get().copied().ok_or(KernelError::UnknownDrone(id))
    }

    pub fn drone_ids(&self) -> Vec<u32> {
        self.entities.keys().copied().collect()
    }

    pub fn time(&self) -> SimTime {
        self.time
    }

    pub fn phase(&self) -> SimPhase {
        self.phase
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Agent runtime access for tests and diagnostics.
    pub fn agent(&self, id: u32) -> Option<&AgentRuntime> {
        self.agents.get(&id)
    }

    // --- Commands ---

    /// Queue an external command for processing at the next tick boundary.
    pub fn queue_command(&mut self, command: SimCommand) {
        self.command_queue.push_back(command);
    }

    // --- Tick ---

    /// Advance the simulation by one tick of `dt` seconds and return the
    /// resulting snapshot. Commands drain first; when the engine is not
    /// running, the world stays frozen and only commands are processed.
    pub fn step(&mut self, dt: f64) -> Result<WorldSnapshot, KernelError> {
        if !(dt > 0.0) || !dt.is_finite() {
            return Err(KernelError::NegativeDt(dt));
        }

        self.process_commands();

        if self.phase == SimPhase::Running {
            self.time.advance(dt);
            let now = self.time.elapsed_secs;
            let mut counters = TickCounters::default();

            // 1. Fire step.
            self.fire.step(dt, &mut self.fire_rng);

            // 2. Vehicle control step.
            let control_output = systems::control::run(
                &mut self.world,
                &self.entities,
                &mut self.agents,
                &mut self.fire,
                &self.config,
                now,
                dt,
                &mut counters,
            )?;

            // 3. Channel update.
            systems::channel_update::run(&mut self.world, &self.entities, &mut self.channel, now)?;

            // 4. Messaging step.
            systems::messaging::run(
                &mut self.world,
                &self.entities,
                &mut self.agents,
                &mut self.channel,
                &mut self.bus,
                &self.config,
                now,
                control_output.outbound,
                &mut counters,
            )?;

            // 5. Energy step.
            systems::energy::run(&mut self.world, &self.entities, &self.config, dt)?;

            // 6. Metrics snapshot.
            let (average_battery, active) = self.battery_aggregate()?;
            let burning = self.fire.summary().burning_count;
            self.metrics
                .fold(self.time.tick, counters, average_battery, active, burning);

            self.check_invariants()?;
        }

        self.export_state()
    }

    /// Deep snapshot of the world: a copy, not a reference.
    pub fn export_state(&self) -> Result<WorldSnapshot, KernelError> {
        systems::snapshot::build_snapshot(
            &self.world,
            &self.entities,
            &self.agents,
            &self.fire,
            &self.channel,
            self.metrics.latest(),
            self.time,
            self.phase,
        )
    }

    // --- Internals ---

    fn lookup(&self, id: u32) -> Result<Entity, KernelError> {
        self.entities
            .get(&id)
            .copied()
            .ok_or(KernelError::UnknownDrone(id))
    }

    fn process_commands(&mut self) {
        while let Some(command) = self.command_queue.pop_front() {
            if let Err(error) = self.handle_command(command) {
                // Boundary rejection: log and leave kernel state untouched.
                warn!(%error, "command rejected");
            }
        }
    }

    fn handle_command(&mut self, command: SimCommand) -> Result<(), KernelError> {
        match command {
            SimCommand::Start => {
                if self.phase == SimPhase::Running {
                    warn!("start ignored: simulation already running");
                } else {
                    info!("simulation started");
                    self.phase = SimPhase::Running;
                }
            }
            SimCommand::Stop => {
                info!("simulation stopped");
                self.phase = SimPhase::Stopped;
            }
            SimCommand::Ignite { x_m, y_m, intensity } => {
                self.ignite(x_m, y_m, intensity)?;
            }
            SimCommand::Suppress { x_m, y_m, strength } => {
                self.apply_suppression(x_m, y_m, strength)?;
            }
            SimCommand::SetWind { speed_ms, heading_rad } => {
                self.set_wind(speed_ms, heading_rad);
            }
            SimCommand::UpdateEtmParams { eta0_m, lambda_per_s } => {
                if eta0_m < 0.0 || lambda_per_s < 0.0 {
                    return Err(KernelError::InvalidInput(
                        "etm parameters must be >= 0".into(),
                    ));
                }
                self.config.swarm.detm_eta0 = eta0_m;
                self.config.swarm.detm_lambda = lambda_per_s;
                for agent in self.agents.values_mut() {
                    agent.etm.set_params(eta0_m, lambda_per_s);
                }
                info!(eta0_m, lambda_per_s, "etm parameters reloaded");
            }
            SimCommand::SetRtlThreshold { percent } => {
                if !(0.0..=100.0).contains(&percent) {
                    return Err(KernelError::InvalidInput(format!(
                        "rtl threshold {percent} must lie in [0, 100]"
                    )));
                }
                self.config.battery.rtl_threshold_percent = percent;
                info!(percent, "rtl threshold reloaded");
            }
            SimCommand::Drone { drone_id, command } => {
                if !self.entities.contains_key(&drone_id) {
                    return Err(KernelError::UnknownDrone(drone_id));
                }
                // Ride the reliable command path: delivered at the next
                // messaging step.
                self.bus.push_reliable(
                    drone_id,
                    SwarmMessage {
                        sender_id: GROUND_STATION_ID,
                        send_time_s: self.time.elapsed_secs,
                        deliver_time_s: self.time.elapsed_secs,
                        payload: MessagePayload::Command { command },
                    },
                );
            }
        }
        Ok(())
    }

    fn battery_aggregate(&self) -> Result<(f64, usize), KernelError> {
        let mut sum = 0.0;
        let mut count = 0usize;
        let mut active = 0usize;
        for (&id, &entity) in &self.entities {
            let mut query = self
                .world
                .query_one::<(&Battery, &DroneState)>(entity)
                .map_err(|_| KernelError::UnknownDrone(id))?;
            let (battery, state) = query.get().ok_or(KernelError::UnknownDrone(id))?;
            sum += battery.percent();
            count += 1;
            if state.is_airborne() {
                active += 1;
            }
        }
        let average = if count == 0 { 0.0 } else { sum / count as f64 };
        Ok((average, active))
    }

    /// Fatal consistency sweep run at the end of every tick.
    fn check_invariants(&self) -> Result<(), KernelError> {
        self.fire.check_invariants()?;
        for (&id, &entity) in &self.entities {
            let mut query = self
                .world
                .query_one::<(&Battery, &Payload, &Position)>(entity)
                .map_err(|_| {
                    KernelError::InvariantViolation(format!("drone {id} lost its entity"))
                })?;
            let (battery, payload, pose) = query.get().ok_or_else(|| {
                KernelError::InvariantViolation(format!("drone {id} lost its components"))
            })?;
            if battery.remaining_wh < 0.0 || !battery.remaining_wh.is_finite() {
                return Err(KernelError::InvariantViolation(format!(
                    "drone {id} battery {} negative",
                    battery.remaining_wh
                )));
            }
            if payload.remaining_units < 0.0 {
                return Err(KernelError::InvariantViolation(format!(
                    "drone {id} payload {} negative",
                    payload.remaining_units
                )));
            }
            if !pose.is_finite() {
                return Err(KernelError::InvariantViolation(format!(
                    "drone {id} pose is not finite"
                )));
            }
        }
        Ok(())
    }
}
