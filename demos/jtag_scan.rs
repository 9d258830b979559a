//! Lists the devices on the JTAG chain behind a parallel port cable.
//!
//! After Test-Logic-Reset every TAP has either IDCODE or BYPASS selected. IDCODEs always start
//! with a 1-bit and BYPASS registers capture a 0, so the devices can be told apart while shifting
//! the data register out.

use parport_jtag::ParportJtag;
use std::path::PathBuf;
use structopt::StructOpt;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

#[derive(StructOpt)]
struct Opts {
    /// Parallel port device (defaults to $XCPORT, then /dev/parport0).
    #[structopt(long = "device", parse(from_os_str))]
    device: Option<PathBuf>,

    /// Maximum number of devices to expect.
    #[structopt(long = "max-devices", default_value = "16")]
    max_devices: usize,
}

fn main() {
    env_logger::init();

    let opts = Opts::from_args();
    if let Err(e) = run(opts) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(opts: Opts) -> Result<()> {
    let mut jtag = ParportJtag::open(opts.device.as_deref(), 0)?;
    println!("Using {}.", jtag.cable());

    // Test-Logic-Reset, then Run-Test/Idle -> Select-DR -> Capture-DR -> Shift-DR
    jtag.shift_tms(&[0b0001_1111], 5)?;
    jtag.shift_tms(&[0b0010], 4)?;

    // Shift ones in; once they appear at TDO as a full "IDCODE", the chain has been read.
    let bits = opts.max_devices * 32 + 32;
    let ones = vec![0xff; (bits + 7) / 8];
    let mut dr = vec![0; ones.len()];
    jtag.shift_block(Some(&ones[..]), Some(&mut dr[..]), bits, true)?;

    // Exit1-DR -> Test-Logic-Reset
    jtag.shift_tms(&[0b1_1111], 5)?;

    let devices = separate_idcodes(&dr, bits)?;
    println!("{} device(s):", devices.len());
    for dev in devices {
        match dev {
            Some(idcode) => {
                let manufacturer = idcode
                    .manufacturer_name()
                    .map(|name| format!(" ({})", name))
                    .unwrap_or_else(|| " [unknown]".to_string());
                println!(
                    "- IDCODE {:#010x}: manufacturer {:#05x}{}, part {:#06x}, version {}",
                    idcode.0,
                    idcode.manufacturer(),
                    manufacturer,
                    idcode.part_number(),
                    idcode.version(),
                );
            }
            None => println!("- <device in BYPASS>"),
        }
    }

    Ok(())
}

struct IdCode(u32);

impl IdCode {
    fn version(&self) -> u8 {
        (self.0 >> 28) as u8
    }

    fn part_number(&self) -> u16 {
        (self.0 >> 12) as u16
    }

    fn manufacturer(&self) -> u16 {
        ((self.0 >> 1) & 0x7ff) as u16
    }

    fn manufacturer_name(&self) -> Option<&'static str> {
        // Bank number is modulo 16 in the IDCODE; JEP106 has fewer banks than that so far.
        let cc = (self.manufacturer() >> 7) as u8 & 0xf;
        let id = self.manufacturer() as u8 & 0x7f;
        jep106::JEP106Code::new(cc, id).get()
    }
}

fn bit(buf: &[u8], index: usize) -> bool {
    (buf[index / 8] >> (index % 8)) & 1 != 0
}

/// Splits captured data register contents into IDCODEs and BYPASS bits.
///
/// Stops at the first all-ones word, which is the filler shifted in behind the chain.
fn separate_idcodes(dr: &[u8], bits: usize) -> Result<Vec<Option<IdCode>>> {
    let mut devices = Vec::new();
    let mut index = 0;
    while index < bits {
        if !bit(dr, index) {
            devices.push(None);
            index += 1;
            continue;
        }

        if index + 32 > bits {
            return Err("chain longer than expected (try a larger --max-devices)".into());
        }
        let idcode = (0..32).fold(0u32, |acc, i| acc | (bit(dr, index + i) as u32) << i);
        if idcode == 0xffff_ffff {
            return Ok(devices);
        }
        devices.push(Some(IdCode(idcode)));
        index += 32;
    }

    Err("no end of chain found (check cable and target power)".into())
}
