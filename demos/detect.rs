//! Detects the cable on a parallel port and prints its signal assignment.

use parport_jtag::ParportJtag;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(StructOpt)]
struct Opts {
    /// Parallel port device (defaults to $XCPORT, then /dev/parport0).
    #[structopt(long = "device", parse(from_os_str))]
    device: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    let opts = Opts::from_args();
    if let Err(e) = run(opts) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(opts: Opts) -> parport_jtag::Result<()> {
    let jtag = ParportJtag::open(opts.device.as_deref(), 0)?;
    let profile = jtag.profile();

    println!("Found {}.", jtag.cable());
    println!("  TCK  {:?}", profile.tck());
    println!("  TMS  {:?}", profile.tms());
    println!("  TDI  {:?}", profile.tdi());
    println!(
        "  TDO  {:?}{}",
        profile.tdo(),
        if profile.tdo_inverted() {
            " (inverted)"
        } else {
            ""
        }
    );
    println!("  idle 0x{:02x}", profile.idle().bits());

    Ok(())
}
