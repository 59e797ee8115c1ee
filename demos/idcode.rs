use std::env;

use jtag_engine::cable::mpsse::{Ft4232hTransport, HostDelay};
use jtag_engine::config::JtagConfig;
use jtag_engine::JtagEngine;

fn main() {
    env_logger::init();

    let config: JtagConfig = match env::args().nth(1) {
        Some(arg) => arg.parse().expect("usage: idcode [VID:PID[:IF][@FREQ]]"),
        None => JtagConfig::default(),
    };

    let mut jtag = JtagEngine::new(Ft4232hTransport::new(), HostDelay);
    let freq = jtag.configure(&config).expect("open cable");
    println!("TCK: {} Hz", freq);

    jtag.reset().expect("reset");
    let idcode = jtag.idcode().expect("idcode");
    println!("IDCODE: {:08x}", idcode);
    println!(
        "  version {:x}, part {:04x}, manufacturer {:03x}",
        idcode >> 28,
        (idcode >> 12) & 0xffff,
        (idcode >> 1) & 0x7ff
    );
    jtag.terminate().expect("terminate");
}
