//! Cable identification.
//!
//! Both supported cables loop some data outputs back to status inputs. The detector drives those
//! outputs through several transitions and requires the inputs to follow every one of them; a
//! single static read could not tell a connected wire from a floating one. Any deviation rejects
//! the port instead of guessing, since driving a misidentified cable could damage the target.

use crate::cable::{byteblaster, pc3, CableKind};
use crate::error::ResultExt as _;
use crate::registers::{Data, Status};
use crate::{Result, Transport};
use log::{debug, info, warn};
use std::fmt;

/// Toggle rounds that must pass before a ByteBlaster is accepted.
const BYTEBLASTER_ROUNDS: u8 = 4;
/// Toggle rounds that must pass before a Parallel Cable III is accepted.
const PC3_ROUNDS: u8 = 2;

/// Reason why no cable was detected.
///
/// Returned inside an [`ErrorKind::NoCable`] error; see [`Error::rejection`].
///
/// [`ErrorKind::NoCable`]: enum.ErrorKind.html#variant.NoCable
/// [`Error::rejection`]: struct.Error.html#method.rejection
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The status register reads all zeros or all ones, so no port hardware is answering.
    DriverSetup { status: u8, control: u8 },

    /// A ByteBlaster is attached but its target side has no power.
    UnpoweredByteBlaster,

    /// A Parallel Cable III is attached but its target side has no power.
    UnpoweredParallelCableIII,

    /// Nothing recognizable is attached.
    NoDongle,

    /// A loopback input did not follow its output in the given toggle round (starting at 1).
    MissingReaction { cable: CableKind, round: u8 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::DriverSetup { status, control } => write!(
                f,
                "status 0x{:02x} control 0x{:02x}, Check system driver setup",
                status, control
            ),
            Rejection::UnpoweredByteBlaster => f.write_str("unpowered ByteBlaster cable"),
            Rejection::UnpoweredParallelCableIII => {
                f.write_str("unpowered Parallel Cable III cable")
            }
            Rejection::NoDongle => f.write_str("no dongle found"),
            Rejection::MissingReaction { cable, round } => {
                write!(f, "missing reaction from {} (round {})", cable, round)
            }
        }
    }
}

impl std::error::Error for Rejection {}

fn reject<T>(rejection: Rejection) -> Result<T> {
    warn!("{}", rejection);
    Err(rejection).jtag_err()
}

/// Whether input `inp` has the same level as output `out`.
fn follows(data: Data, out: Data, status: Status, inp: Status) -> bool {
    data.contains(out) == status.contains(inp)
}

/// ByteBlaster: both loopbacks follow their outputs.
fn byteblaster_loopback(data: Data, status: Status) -> bool {
    follows(data, byteblaster::LB_OUT, status, byteblaster::LB_IN)
        && follows(data, byteblaster::ACK_OUT, status, byteblaster::ACK_IN)
}

/// Parallel Cable III: the check output reaches PAPEROUT directly and BUSY through the register
/// inversion.
fn pc3_feedback(data: Data, status: Status) -> bool {
    !follows(data, pc3::CHECK_OUT, status, pc3::CHECK_IN1)
        && follows(data, pc3::CHECK_OUT, status, pc3::CHECK_IN2)
}

/// Unpowered Parallel Cable III: the D6 feedback still reaches one of its inputs.
fn pc3_unpowered(data: Data, status: Status) -> bool {
    !follows(data, pc3::CHECK_OUT, status, pc3::CHECK_IN1)
        || follows(data, pc3::CHECK_OUT, status, pc3::CHECK_IN2)
}

/// Flips `toggle` in the data register and reads the resulting status.
fn toggle<P: Transport>(port: &mut P, data: &mut Data, toggle: Data) -> Result<Status> {
    *data = data.toggled(toggle);
    port.write_data(data.bits())?;
    Ok(Status::from_raw(port.read_status()?))
}

/// Identifies the cable attached to `port`.
///
/// On success for a ByteBlaster, its output enable is switched on in the control register.
/// Every failed check yields an [`ErrorKind::NoCable`] error; register access failures are
/// passed on unchanged.
///
/// [`ErrorKind::NoCable`]: enum.ErrorKind.html#variant.NoCable
pub fn detect_cable<P: Transport>(port: &mut P) -> Result<CableKind> {
    let mut data = Data::empty();
    port.write_data(data.bits())?;
    let raw = port.read_status()?;
    let control = port.read_control()?;
    debug!("idle status 0x{:02x} control 0x{:02x}", raw, control);

    if raw == 0x00 || raw == 0xff {
        return reject(Rejection::DriverSetup {
            status: raw,
            control,
        });
    }

    let status = Status::from_raw(raw);

    // nERROR is tied to ground on a powered ByteBlaster
    if !status.contains(Status::ERROR) {
        debug!("trying ByteBlaster");

        if !follows(data, byteblaster::LB_OUT, status, byteblaster::LB_IN) {
            // Without power only the D7/PAPEROUT loopback is lost
            if follows(data, byteblaster::ACK_OUT, status, byteblaster::ACK_IN) {
                return reject(Rejection::UnpoweredByteBlaster);
            } else if pc3_unpowered(data, status) {
                return reject(Rejection::UnpoweredParallelCableIII);
            } else {
                return reject(Rejection::NoDongle);
            }
        }

        for round in 1..=BYTEBLASTER_ROUNDS {
            let line = if round % 2 == 1 {
                byteblaster::LB_OUT
            } else {
                byteblaster::ACK_OUT
            };
            let status = toggle(port, &mut data, line)?;
            if !byteblaster_loopback(data, status) {
                return reject(Rejection::MissingReaction {
                    cable: CableKind::ByteBlaster,
                    round,
                });
            }
        }

        info!("found ByteBlaster cable");
        let control = port.read_control()?;
        port.write_control(control | byteblaster::ENABLE_N.bits())?;
        Ok(CableKind::ByteBlaster)
    } else {
        debug!("trying Parallel Cable III");

        if !pc3_feedback(data, status) {
            return reject(Rejection::NoDongle);
        }

        // Checking TDO for missing target power is unreliable: an HC125 buffer on the cable
        // cannot always pull the line low against a strong driver at the end of the chain.

        for round in 1..=PC3_ROUNDS {
            let status = toggle(port, &mut data, pc3::CHECK_OUT)?;
            if !pc3_feedback(data, status) {
                return reject(Rejection::MissingReaction {
                    cable: CableKind::ParallelCableIII,
                    round,
                });
            }
        }

        info!("found Xilinx Parallel Cable III");
        Ok(CableKind::ParallelCableIII)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{byteblaster_wiring, pc3_wiring, Access, MockPort};
    use crate::ErrorKind;
    use std::cell::Cell;
    use std::rc::Rc;

    fn rejection(port: &mut MockPort) -> Rejection {
        let err = detect_cable(port).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoCable);
        err.rejection().cloned().unwrap()
    }

    /// Wraps `wiring`, XOR-ing `flip` into the status of the `nth` status read (0-based).
    fn glitch(wiring: fn(u8) -> u8, nth: usize, flip: u8) -> MockPort {
        let reads = Rc::new(Cell::new(0));
        MockPort::new(move |data| {
            let n = reads.get();
            reads.set(n + 1);
            let status = wiring(data);
            if n == nth {
                status ^ flip
            } else {
                status
            }
        })
    }

    #[test]
    fn degenerate_status_short_circuits() {
        for &raw in &[0x00, 0xff] {
            let mut port = MockPort::stuck(raw);
            let log = port.log();
            let err = detect_cable(&mut port).unwrap_err();
            assert!(err.to_string().contains("Check system driver setup"), "{}", err);
            assert_eq!(
                err.rejection(),
                Some(&Rejection::DriverSetup {
                    status: raw,
                    control: 0
                })
            );
            assert_eq!(
                *log.borrow(),
                [
                    Access::WriteData(0),
                    Access::ReadStatus(raw),
                    Access::ReadControl(0)
                ]
            );
        }
    }

    #[test]
    fn byteblaster() {
        let mut port = MockPort::byteblaster();
        let log = port.log();
        assert_eq!(detect_cable(&mut port).unwrap(), CableKind::ByteBlaster);

        let log = log.borrow();
        let writes: Vec<_> = log
            .iter()
            .filter_map(|a| match a {
                Access::WriteData(d) => Some(*d),
                _ => None,
            })
            .collect();
        assert_eq!(writes, [0x00, 0x80, 0xa0, 0x20, 0x00]);
        assert_eq!(
            log[log.len() - 2..],
            [Access::ReadControl(0x00), Access::WriteControl(0x02)]
        );
    }

    #[test]
    fn byteblaster_every_round_must_react() {
        // Status read 0 is the idle read, read `round` belongs to toggle round `round`
        for round in 1..=BYTEBLASTER_ROUNDS {
            for &line in &[Status::PAPEROUT, Status::ACK] {
                let mut port = glitch(byteblaster_wiring, usize::from(round), line.bits());
                let log = port.log();
                assert_eq!(
                    rejection(&mut port),
                    Rejection::MissingReaction {
                        cable: CableKind::ByteBlaster,
                        round
                    }
                );
                assert!(!log
                    .borrow()
                    .iter()
                    .any(|a| matches!(a, Access::WriteControl(_))));
            }
        }
    }

    #[test]
    fn unpowered_byteblaster() {
        // PAPEROUT stuck high, nACK still follows D5
        let mut port = MockPort::stuck(0x30);
        assert_eq!(rejection(&mut port), Rejection::UnpoweredByteBlaster);
    }

    #[test]
    fn unpowered_pc3_in_byteblaster_branch() {
        // PAPEROUT high, nACK high against D5 low, BUSY bit set against D6 low
        let mut port = MockPort::stuck(0xe0);
        assert_eq!(rejection(&mut port), Rejection::UnpoweredParallelCableIII);
    }

    #[test]
    fn no_dongle_in_byteblaster_branch() {
        // Same, but the BUSY bit reads clear, matching neither cable
        let mut port = MockPort::stuck(0x60);
        assert_eq!(rejection(&mut port), Rejection::NoDongle);
    }

    #[test]
    fn byteblaster_branch_diagnoses_all_outcomes() {
        let mut seen = Vec::new();
        for raw in 0x01..0xffu8 {
            if raw & Status::ERROR.bits() != 0 {
                continue;
            }
            let mut port = MockPort::stuck(raw);
            if let Err(err) = detect_cable(&mut port) {
                if let Some(r) = err.rejection() {
                    if !seen.contains(r) {
                        seen.push(r.clone());
                    }
                }
            }
        }
        assert!(seen.contains(&Rejection::UnpoweredByteBlaster));
        assert!(seen.contains(&Rejection::UnpoweredParallelCableIII));
        assert!(seen.contains(&Rejection::NoDongle));
    }

    #[test]
    fn parallel_cable_iii() {
        let mut port = MockPort::parallel_cable_iii();
        let log = port.log();
        let kind = detect_cable(&mut port).unwrap();
        assert_eq!(kind, CableKind::ParallelCableIII);
        assert!(!kind.profile().tdo_inverted());

        let log = log.borrow();
        assert!(!log.iter().any(|a| matches!(a, Access::WriteControl(_))));
        assert_eq!(
            log.iter()
                .filter(|a| matches!(a, Access::WriteData(_)))
                .count(),
            3
        );
    }

    #[test]
    fn pc3_every_round_must_react() {
        for round in 1..=PC3_ROUNDS {
            for &line in &[Status::BUSY, Status::PAPEROUT] {
                let mut port = glitch(pc3_wiring, usize::from(round), line.bits());
                assert_eq!(
                    rejection(&mut port),
                    Rejection::MissingReaction {
                        cable: CableKind::ParallelCableIII,
                        round
                    }
                );
            }
        }
    }

    #[test]
    fn pc3_without_feedback() {
        // nERROR high, but BUSY does not mirror D6
        let mut port = MockPort::stuck(0x18);
        assert_eq!(rejection(&mut port), Rejection::NoDongle);
    }

    #[test]
    fn detection_is_repeatable() {
        let mut port = MockPort::byteblaster();
        let first = detect_cable(&mut port).unwrap();
        let second = detect_cable(&mut port).unwrap();
        assert_eq!(first, second);

        let mut port = MockPort::stuck(0x18);
        assert_eq!(rejection(&mut port), rejection(&mut port));
    }

    #[test]
    fn register_failure_is_not_a_rejection() {
        let mut port = MockPort::byteblaster().failing_after(2);
        let err = detect_cable(&mut port).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RegisterIo);
        assert!(err.rejection().is_none());
    }
}
