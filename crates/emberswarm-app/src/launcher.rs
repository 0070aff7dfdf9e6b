//! External flight-controller process assignment.
//!
//! The simulator does not manage the flight-controller processes itself; it
//! only fixes the port and system-identifier contract their launcher must
//! follow so every vehicle's link stays unique through the in-host
//! multiplex.

use emberswarm_core::constants::{FLIGHT_CONTROLLER_BASE_PORT, FLIGHT_CONTROLLER_PORT_STRIDE};
use emberswarm_core::error::KernelError;

/// The assignment for one vehicle's external flight controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlightControllerEndpoint {
    pub drone_id: u32,
    /// Base UDP port: 14550 + 10 * id.
    pub base_udp_port: u32,
    /// Protocol system identifier: id + 1.
    pub system_id: u32,
}

/// Compute the endpoint assignment for a vehicle id (ids start at 1).
pub fn endpoint_for(drone_id: u32) -> Result<FlightControllerEndpoint, KernelError> {
    if drone_id == 0 {
        return Err(KernelError::InvalidDroneId(drone_id));
    }
    Ok(FlightControllerEndpoint {
        drone_id,
        base_udp_port: FLIGHT_CONTROLLER_BASE_PORT + FLIGHT_CONTROLLER_PORT_STRIDE * drone_id,
        system_id: drone_id + 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_and_sysid_formulas() {
        let first = endpoint_for(1).unwrap();
        assert_eq!(first.base_udp_port, 14560);
        assert_eq!(first.system_id, 2);

        let tenth = endpoint_for(10).unwrap();
        assert_eq!(tenth.base_udp_port, 14650);
        assert_eq!(tenth.system_id, 11);
    }

    #[test]
    fn test_assignments_never_collide() {
        let mut ports = std::collections::BTreeSet::new();
        let mut sysids = std::collections::BTreeSet::new();
        for id in 1..=100 {
            let endpoint = endpoint_for(id).unwrap();
            assert!(ports.insert(endpoint.base_udp_port));
            assert!(sysids.insert(endpoint.system_id));
        }
    }

    #[test]
    fn test_zero_id_rejected() {
        assert!(endpoint_for(0).is_err());
    }
}
