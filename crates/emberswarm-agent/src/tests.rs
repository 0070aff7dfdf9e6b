//! Tests for the ETM trigger law, the neighbor observer, and the drone FSM.

use emberswarm_core::commands::DroneCommand;
use emberswarm_core::enums::{DroneState, EtmNorm};
use emberswarm_core::types::{Position, Velocity};

use crate::etm::{EtmController, EtmParams};
use crate::fsm::{evaluate, DroneAction, DroneContext, FlightLimits};
use crate::observer::{NeighborObserver, ObserverParams};

fn etm_params(eta0: f64, lambda: f64) -> EtmParams {
    EtmParams {
        eta0_m: eta0,
        lambda_per_s: lambda,
        eta_min_m: 0.01,
        norm: EtmNorm::L2,
    }
}

// ---- ETM ----

#[test]
fn test_etm_first_transmission_always_fires() {
    let mut etm = EtmController::new(etm_params(1.0, 0.5));
    let decision = etm.decide(0.0, Position::new(0.0, 0.0, 0.0));
    assert!(decision.transmit);
}

#[test]
fn test_etm_threshold_decays_with_silence() {
    let etm = EtmController::new(etm_params(1.0, 0.5));
    assert!((etm.threshold(0.0) - 1.0).abs() < 1e-12);
    let later = etm.threshold(2.0);
    assert!((later - (-1.0f64).exp()).abs() < 1e-12);
    // Long silences floor at eta_min rather than underflowing.
    assert!((etm.threshold(1e6) - 0.01).abs() < 1e-15);
}

#[test]
fn test_etm_triggers_on_threshold_crossing() {
    let mut etm = EtmController::new(etm_params(1.0, 0.5));
    let origin = Position::new(0.0, 0.0, 0.0);
    etm.decide(0.0, origin);
    etm.record_transmission(0.0, origin);

    // Small displacement below the decayed threshold: suppressed.
    let near = Position::new(0.2, 0.0, 0.0);
    assert!(!etm.decide(0.1, near).transmit);

    // Displacement beyond the threshold: fires.
    let far = Position::new(2.0, 0.0, 0.0);
    assert!(etm.decide(0.2, far).transmit);
}

#[test]
fn test_etm_idempotent_within_a_tick() {
    let mut etm = EtmController::new(etm_params(1.0, 0.5));
    let origin = Position::new(0.0, 0.0, 0.0);
    etm.decide(0.0, origin);
    etm.record_transmission(0.0, origin);

    let pose = Position::new(0.1, 0.0, 0.0);
    let first = etm.decide(1.0, pose);
    let suppressed_after_first = etm.total_suppressed();
    let second = etm.decide(1.0, pose);

    assert_eq!(first, second);
    assert_eq!(
        etm.total_suppressed(),
        suppressed_after_first,
        "re-evaluation at the same instant must not recount"
    );
}

#[test]
fn test_etm_zero_eta0_with_zero_floor_is_permissive() {
    let mut etm = EtmController::new(EtmParams {
        eta0_m: 0.0,
        lambda_per_s: 0.5,
        eta_min_m: 0.0,
        norm: EtmNorm::L2,
    });
    // First transmission fires, and every subsequent tick with any motion
    // fires as well: the threshold is always zero.
    let mut pose = Position::new(0.0, 0.0, 0.0);
    for tick in 0..50 {
        let now = tick as f64 * 0.1;
        let decision = etm.decide(now, pose);
        assert!(decision.transmit, "tick {tick} should transmit");
        etm.record_transmission(now, pose);
        pose.x += 0.2;
    }
    assert_eq!(etm.total_transmissions(), 50);
    assert_eq!(etm.total_suppressed(), 0);
}

#[test]
fn test_etm_linf_norm() {
    let mut etm = EtmController::new(EtmParams {
        eta0_m: 1.0,
        lambda_per_s: 0.0,
        eta_min_m: 0.01,
        norm: EtmNorm::LInf,
    });
    let origin = Position::new(0.0, 0.0, 0.0);
    etm.decide(0.0, origin);
    etm.record_transmission(0.0, origin);

    // L2 norm of (0.8, 0.8, 0) is ~1.13 but L-inf is 0.8: suppressed.
    assert!(!etm.decide(1.0, Position::new(0.8, 0.8, 0.0)).transmit);
    assert!(etm.decide(2.0, Position::new(1.2, 0.0, 0.0)).transmit);
}

#[test]
fn test_etm_constant_velocity_fixed_point_period() {
    // A drone on a straight line at 2 m/s with eta0 = 5 m, lambda = 0.5:
    // the trigger period settles at the fixed point of v*dt = eta0*e^(-l*dt),
    // about 1.4 s at 0.1 s ticks, i.e. ~43 transmissions per minute. This is
    // the bandwidth reduction the trigger law buys over any >= 1 Hz fixed
    // rate (60/min) or per-tick streaming (600/min).
    let mut etm = EtmController::new(EtmParams {
        eta0_m: 5.0,
        lambda_per_s: 0.5,
        eta_min_m: 0.01,
        norm: EtmNorm::L2,
    });
    let mut count = 0u32;
    for tick in 0..600 {
        let now = tick as f64 * 0.1;
        let pose = Position::new(2.0 * now, 0.0, 0.0);
        if etm.decide(now, pose).transmit {
            etm.record_transmission(now, pose);
            count += 1;
        }
    }
    assert!(
        (25..=45).contains(&count),
        "expected 25..=45 transmissions, got {count}"
    );
}

#[test]
fn test_etm_reduction_with_default_params() {
    // Even with the small default threshold, event triggering stays well
    // below per-tick streaming for a 2 m/s traverse.
    let mut etm = EtmController::new(etm_params(1.0, 0.5));
    let mut count = 0u32;
    for tick in 0..600 {
        let now = tick as f64 * 0.1;
        let pose = Position::new(2.0 * now, 0.0, 0.0);
        if etm.decide(now, pose).transmit {
            etm.record_transmission(now, pose);
            count += 1;
        }
    }
    assert!(count < 150, "expected far fewer than 600 transmissions, got {count}");
}

#[test]
fn test_etm_hot_reload_preserves_counters() {
    let mut etm = EtmController::new(etm_params(1.0, 0.5));
    etm.decide(0.0, Position::default());
    etm.record_transmission(0.0, Position::default());
    etm.set_params(2.0, 0.1);
    assert_eq!(etm.total_transmissions(), 1);
    assert!((etm.params().eta0_m - 2.0).abs() < 1e-12);
    assert!(etm.last_broadcast_pose().is_some());
}

// ---- Observer ----

fn observer(max_age_s: f64) -> NeighborObserver {
    NeighborObserver::new(ObserverParams {
        max_age_s,
        min_confidence: 0.0,
    })
}

#[test]
fn test_observer_predicts_constant_velocity() {
    let mut obs = observer(0.5);
    obs.update(
        2,
        1.0,
        1.0,
        Position::new(10.0, 0.0, 5.0),
        Velocity::new(1.0, 0.0, 0.0),
    );
    let pred = obs.predict(2, 1.3).unwrap();
    assert!((pred.pose.x - 10.3).abs() < 1e-9);
    // confidence = 1 - 0.8 * (0.3 / 0.5)
    assert!((pred.confidence - 0.52).abs() < 1e-9);
}

#[test]
fn test_observer_expiry_freezes_pose() {
    let mut obs = observer(0.5);
    obs.update(
        2,
        0.0,
        0.0,
        Position::new(10.0, 0.0, 5.0),
        Velocity::new(3.0, 0.0, 0.0),
    );
    let pred = obs.predict(2, 2.0).unwrap();
    assert_eq!(pred.confidence, 0.0);
    // No extrapolation beyond max age.
    assert!((pred.pose.x - 10.0).abs() < 1e-12);
}

#[test]
fn test_observer_confidence_range() {
    let mut obs = observer(0.5);
    obs.update(1, 0.0, 0.0, Position::default(), Velocity::default());
    assert!((obs.predict(1, 0.0).unwrap().confidence - 1.0).abs() < 1e-12);
    assert!((obs.predict(1, 0.5).unwrap().confidence - 0.2).abs() < 1e-12);
}

#[test]
fn test_observer_stale_send_never_overwrites() {
    let mut obs = observer(0.5);
    obs.update(3, 2.0, 2.1, Position::new(5.0, 0.0, 0.0), Velocity::default());
    // A message sent earlier (send_time 1.0) arrives late: ignored.
    obs.update(3, 1.0, 2.2, Position::new(99.0, 0.0, 0.0), Velocity::default());
    let estimate = obs.estimate(3).unwrap();
    assert!((estimate.pose.x - 5.0).abs() < 1e-12);
}

#[test]
fn test_observer_missing_neighbor_is_empty_not_error() {
    let obs = observer(0.5);
    assert!(obs.predict(42, 1.0).is_none());
    assert!(obs
        .collision_risks(1.0, Position::default(), 10.0)
        .is_empty());
}

#[test]
fn test_observer_collision_alert_head_on() {
    // Two drones closing head-on at 3 m/s each from 20 m apart, exchanging
    // telemetry only at t = 0. With a 5 s estimate horizon, A predicts B at
    // (11, 0, 10) at t = 3 s, within 10 m of A's own (9, 0, 10).
    let mut obs = observer(5.0);
    obs.update(
        2,
        0.0,
        0.0,
        Position::new(20.0, 0.0, 10.0),
        Velocity::new(-3.0, 0.0, 0.0),
    );

    let pred = obs.predict(2, 3.0).unwrap();
    assert!((pred.pose.x - 11.0).abs() < 1e-9);
    assert!((pred.pose.y).abs() < 1e-9);
    assert!((pred.pose.z - 10.0).abs() < 1e-9);

    let own_at = |t: f64| Position::new(3.0 * t, 0.0, 10.0);
    let risks = obs.collision_risks(3.0, own_at(3.0), 10.0);
    assert_eq!(risks.len(), 1, "alert should be active at t = 3.0 s");
    assert_eq!(risks[0].neighbor_id, 2);

    // Well before closure the alert is quiet.
    assert!(obs.collision_risks(0.5, own_at(0.5), 10.0).is_empty());
}

#[test]
fn test_observer_min_confidence_floor_filters() {
    let mut obs = NeighborObserver::new(ObserverParams {
        max_age_s: 1.0,
        min_confidence: 0.5,
    });
    obs.update(7, 0.0, 0.0, Position::new(1.0, 0.0, 0.0), Velocity::default());
    // At age 0.9 the confidence is 0.28, below the floor.
    assert!(obs.collision_risks(0.9, Position::default(), 10.0).is_empty());
    // At age 0.1 the confidence is 0.92, above the floor.
    assert_eq!(obs.collision_risks(0.1, Position::default(), 10.0).len(), 1);
}

// ---- FSM ----

fn limits() -> FlightLimits {
    FlightLimits {
        cruise_speed_ms: 15.0,
        climb_rate_ms: 2.0,
        takeoff_altitude_m: 10.0,
        landing_radius_m: 5.0,
        waypoint_radius_m: 5.0,
        rtl_threshold_percent: 20.0,
        suppression_strength: 0.8,
    }
}

fn base_ctx(state: DroneState) -> DroneContext {
    DroneContext {
        state,
        pose: Position::new(100.0, 100.0, 10.0),
        battery_percent: 90.0,
        payload_remaining: 40.0,
        home: Position::new(10.0, 10.0, 0.0),
        local_fire_intensity: 0.0,
        fire_detected: false,
        waypoint: None,
        known_fire: None,
        formation_target: None,
        pending_command: None,
        collision_deferred: false,
        limits: limits(),
    }
}

#[test]
fn test_fsm_idle_takeoff_command() {
    let mut ctx = base_ctx(DroneState::Idle);
    ctx.pose = Position::new(10.0, 10.0, 0.0);
    ctx.pending_command = Some(DroneCommand::Takeoff);
    let update = evaluate(&ctx);
    assert_eq!(update.new_state, DroneState::Takeoff);
    assert!(update.state_changed);
}

#[test]
fn test_fsm_idle_takeoff_blocked_by_low_battery() {
    let mut ctx = base_ctx(DroneState::Idle);
    ctx.battery_percent = 15.0;
    ctx.pending_command = Some(DroneCommand::Takeoff);
    let update = evaluate(&ctx);
    assert_eq!(update.new_state, DroneState::Idle);
}

#[test]
fn test_fsm_takeoff_climbs_then_searches() {
    let mut ctx = base_ctx(DroneState::Takeoff);
    ctx.pose.z = 4.0;
    let update = evaluate(&ctx);
    assert_eq!(update.new_state, DroneState::Takeoff);
    assert!(update.velocity.z > 0.0);

    ctx.pose.z = 10.0;
    let update = evaluate(&ctx);
    assert_eq!(update.new_state, DroneState::Search);
}

#[test]
fn test_fsm_search_detection_enters_suppress() {
    let mut ctx = base_ctx(DroneState::Search);
    ctx.fire_detected = true;
    ctx.local_fire_intensity = 0.6;
    let update = evaluate(&ctx);
    assert_eq!(update.new_state, DroneState::Suppress);
}

#[test]
fn test_fsm_search_requests_waypoint_when_none() {
    let ctx = base_ctx(DroneState::Search);
    let update = evaluate(&ctx);
    assert_eq!(update.action, DroneAction::RequestWaypoint);
}

#[test]
fn test_fsm_search_steers_toward_known_fire_over_waypoint() {
    let mut ctx = base_ctx(DroneState::Search);
    ctx.waypoint = Some(Position::new(0.0, 100.0, 10.0));
    ctx.known_fire = Some(Position::new(200.0, 100.0, 10.0));
    let update = evaluate(&ctx);
    assert!(
        update.velocity.x > 0.0,
        "should fly toward the reported fire, not the waypoint"
    );
}

#[test]
fn test_fsm_search_collision_defers_motion() {
    let mut ctx = base_ctx(DroneState::Search);
    ctx.waypoint = Some(Position::new(200.0, 100.0, 10.0));
    ctx.collision_deferred = true;
    let update = evaluate(&ctx);
    assert_eq!(update.velocity.horizontal_speed(), 0.0);
}

#[test]
fn test_fsm_suppress_emits_action_then_returns_to_search() {
    let mut ctx = base_ctx(DroneState::Suppress);
    ctx.local_fire_intensity = 0.5;
    let update = evaluate(&ctx);
    assert_eq!(update.action, DroneAction::Suppress { strength: 0.8 });
    assert_eq!(update.new_state, DroneState::Suppress);

    ctx.local_fire_intensity = 0.001;
    let update = evaluate(&ctx);
    assert_eq!(update.new_state, DroneState::Search);
}

#[test]
fn test_fsm_rtl_override_battery_from_any_airborne_state() {
    for state in [
        DroneState::Takeoff,
        DroneState::Search,
        DroneState::Formation,
        DroneState::Suppress,
    ] {
        let mut ctx = base_ctx(state);
        ctx.battery_percent = 19.0;
        let update = evaluate(&ctx);
        assert_eq!(
            update.new_state,
            DroneState::ReturnToLaunch,
            "state {state:?} should yield to the battery override"
        );
    }
}

#[test]
fn test_fsm_rtl_override_payload_empty() {
    let mut ctx = base_ctx(DroneState::Suppress);
    ctx.local_fire_intensity = 0.9;
    ctx.payload_remaining = 0.0;
    let update = evaluate(&ctx);
    assert_eq!(update.new_state, DroneState::ReturnToLaunch);
}

#[test]
fn test_fsm_rtl_lands_within_radius() {
    let mut ctx = base_ctx(DroneState::ReturnToLaunch);
    ctx.pose = Position::new(12.0, 11.0, 3.0);
    let update = evaluate(&ctx);
    assert_eq!(update.new_state, DroneState::Land);

    // Far from home: flies toward the dock.
    let mut ctx = base_ctx(DroneState::ReturnToLaunch);
    ctx.battery_percent = 10.0;
    let update = evaluate(&ctx);
    assert_eq!(update.new_state, DroneState::ReturnToLaunch);
    assert!(update.velocity.x < 0.0 && update.velocity.y < 0.0);
}

#[test]
fn test_fsm_land_docks_on_ground() {
    let mut ctx = base_ctx(DroneState::Land);
    ctx.pose.z = 0.05;
    let update = evaluate(&ctx);
    assert_eq!(update.new_state, DroneState::Idle);
    assert_eq!(update.action, DroneAction::Dock);

    let mut ctx = base_ctx(DroneState::Land);
    ctx.pose.z = 2.0;
    let update = evaluate(&ctx);
    assert!(update.velocity.z < 0.0);
}

#[test]
fn test_fsm_formation_holds_on_target() {
    let mut ctx = base_ctx(DroneState::Formation);
    ctx.formation_target = Some(Position::new(150.0, 100.0, 10.0));
    let update = evaluate(&ctx);
    assert!(update.velocity.x > 0.0);

    ctx.formation_target = Some(Position::new(101.0, 100.0, 10.0));
    let update = evaluate(&ctx);
    assert_eq!(update.velocity.horizontal_speed(), 0.0);
}

#[test]
fn test_fsm_enter_formation_command() {
    let mut ctx = base_ctx(DroneState::Search);
    ctx.pending_command = Some(DroneCommand::EnterFormation { leader_id: 1 });
    let update = evaluate(&ctx);
    assert_eq!(update.new_state, DroneState::Formation);
}
