

#[macro_use]
extern crate log;
extern crate argparse;
extern crate byteorder;
extern crate term;

use argparse::{ArgumentParser, Parse, ParseOption, Print, Store, StoreFalse, StoreTrue};
use std::path::PathBuf;
use std::process;

use crate::debugger::Debugger;
use crate::hardware::{CpuStop, NandFlash, PhxError, Phoenix};

mod debugger;
mod hardware;
mod logger;


struct CmdLineArgs {
    flash_file_path: Option<PathBuf>,
    boot_rom_path: Option<PathBuf>,
    log_file_path: PathBuf,
    new_flash: bool,
    large_nand: bool,
    large_sdram: bool,
    product: String,
    preload_boot2: Option<PathBuf>,
    preload_diags: Option<PathBuf>,
    debug_on_start: bool,
    verbose: bool,
    colour: bool,
}

impl Default for CmdLineArgs {
    //
    fn default() -> CmdLineArgs {
        CmdLineArgs {
            flash_file_path: None,
            boot_rom_path: None,
            log_file_path: PathBuf::from("./PhxEmu.log"),
            new_flash: false,
            large_nand: false,
            large_sdram: false,
            product: "0E0".to_string(),
            preload_boot2: None,
            preload_diags: None,
            debug_on_start: false,
            verbose: false,
            colour: true,
        }
    }
}


fn main() {
    // Build command line parser.
    let mut args = CmdLineArgs::default();
    parse_command_line(&mut args);
    configure_logging(&args);

    // Prepare the machine.
    let nand = match build_flash(&args) {
        Ok(nand) => nand,
        Err(e) => {
            error!("Failed preparing the flash image:\n{}", e);
            process::exit(1);
        }
    };
    let mut phx = match Phoenix::new(nand) {
        Ok(phx) => phx,
        Err(e) => {
            error!("Failed building the machine:\n{}", e);
            process::exit(1);
        }
    };
    if let Some(ref fp) = args.boot_rom_path {
        if let Err(e) = phx.load_boot_rom(fp.as_path()) {
            error!("Failed loading the boot ROM:\n{}", e);
            process::exit(1);
        }
    }
    if let Err(e) = phx.reset() {
        error!("Failed resetting the machine:\n{}", e);
        process::exit(1);
    }

    // Run it.
    let mut debugger = Debugger::new();
    debugger.with_colour(args.colour);
    if args.debug_on_start {
        debugger.enter(phx.cpu_mut(), hardware::DebugEntry::ExecBreakpoint);
        phx.cpu_mut().set_debug_resume();
    }
    run_emulation(&mut phx, &mut debugger);

    // Flush dirty NAND blocks before leaving.
    if let Err(e) = phx.save_flash() {
        error!("Failed saving the flash image:\n{}", e);
        process::exit(1);
    }
}


fn parse_command_line(args: &mut CmdLineArgs) {
    let mut parser = ArgumentParser::new();
    parser.set_description("An ARM926EJ-S graphing calculator emulator written in Rust.");
    parser.add_option(&["-V", "--version"],
                      Print(format!("PhxEmu v{}", env!("CARGO_PKG_VERSION"))),
                      "Show current version.");
    parser.refer(&mut args.flash_file_path)
          .add_option(&["--flash"], ParseOption,
                      "Path to a flash image to load (33 MiB or 132 MiB), \
                       or to create with --new-flash.")
          .metavar("PATH");
    parser.refer(&mut args.new_flash)
          .add_option(&["--new-flash"], StoreTrue,
                      "Create a fresh flash image instead of loading one.");
    parser.refer(&mut args.large_nand)
          .add_option(&["--large-nand"], StoreTrue,
                      "Give a created image the large-page NAND chip.");
    parser.refer(&mut args.large_sdram)
          .add_option(&["--large-sdram"], StoreTrue,
                      "Give a created image the 64 MiB SDRAM configuration.");
    parser.refer(&mut args.product)
          .add_option(&["--product"], Store,
                      "Product code for a created image as hex, e.g. 0E0 or 0F0.")
          .metavar("CODE");
    parser.refer(&mut args.preload_boot2)
          .add_option(&["--boot2"], ParseOption, "Boot2 payload to preload into a created image.")
          .metavar("PATH");
    parser.refer(&mut args.preload_diags)
          .add_option(&["--diags"], ParseOption, "Diags payload to preload into a created image.")
          .metavar("PATH");
    parser.refer(&mut args.boot_rom_path)
          .add_option(&["--boot1"], ParseOption, "Path to a boot ROM image.")
          .metavar("PATH");
    parser.refer(&mut args.log_file_path)
          .add_option(&["--log"], Parse, "Custom path for the log file.")
          .metavar("PATH");
    parser.refer(&mut args.debug_on_start)
          .add_option(&["-d", "--debug"], StoreTrue, "Enter the debugger before executing anything.");
    parser.refer(&mut args.verbose)
          .add_option(&["-v", "--verbose"], StoreTrue, "Log extra messages and information.");
    parser.refer(&mut args.colour)
          .add_option(&["-c", "--with-colour"], StoreTrue, "Enable terminal output with colour codes. (default)")
          .add_option(&["-k", "--without-colour"], StoreFalse, "Disable terminal output with colour codes.");
    parser.parse_args_or_exit();
}


fn configure_logging(args: &CmdLineArgs) {
    let p = args.log_file_path.as_path();
    logger::init_with(p, args.verbose, args.colour).unwrap();
    info!("Logging to file `{}`.", p.display());
}


fn build_flash(args: &CmdLineArgs) -> Result<NandFlash, PhxError> {
    if args.new_flash {
        let product = u32::from_str_radix(args.product.trim_start_matches("0x"), 16)
            .unwrap_or_else(|_| {
                warn!("Product code `{}` is not hex; using 0E0.", args.product);
                0x0E0
            });
        let mut nand = NandFlash::create_new(
            args.large_nand, product, args.large_sdram,
            args.preload_boot2.as_deref(), args.preload_diags.as_deref())?;
        if let Some(ref fp) = args.flash_file_path {
            nand.save_as(fp.as_path())?;
        }
        Ok(nand)
    } else if let Some(ref fp) = args.flash_file_path {
        NandFlash::open(fp.as_path())
    } else {
        warn!("No flash image given; running against a blank chip.");
        Ok(NandFlash::new(false))
    }
}


fn run_emulation(phx: &mut Phoenix, debugger: &mut Debugger) {
    while !phx.events().exiting() {
        if phx.is_idle() {
            info!("CPU is waiting for interrupts and nothing can raise one; stopping.");
            break;
        }
        match phx.run_quantum() {
            Ok(CpuStop::Debug(entry)) => {
                phx.clear_debug_step();
                debugger.enter(phx.cpu_mut(), entry);
                phx.cpu_mut().set_debug_resume();
            }
            Ok(_) => {}
            Err(e) => {
                error!("Emulation stopped:\n{}", e);
                break;
            }
        }
    }
}
