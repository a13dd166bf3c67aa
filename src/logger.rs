

use std::io::Write;
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use log::{set_boxed_logger, set_max_level, Log, Metadata, Record, Level, LevelFilter, SetLoggerError};


pub struct ConsoleFileLogger {
    pub file: Option<Mutex<File>>,
    pub verbose: bool,
    pub colour: bool,
}

impl Log for ConsoleFileLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        let min_level = if self.verbose { Level::Trace } else { Level::Info };
        metadata.level() <= min_level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            // Prepare some common message sections in case of colouring.
            let loc = format!("[{}:{}]",
                record.file().unwrap_or("<?>"),
                record.line().unwrap_or(0));
            let fmt = format!("{}", record.args()).replace("\n", "\n\t\t   ");

            // Build a common log message for both targets.
            let msg = format!("{}\t{}\n\t\t-- {}\n", record.level(), loc, fmt);

            // Log to file.
            if let Some(f) = self.file.as_ref() {
                let mut tmp = f.lock().unwrap();
                writeln!(tmp, "{}", msg).unwrap_or(());
            }

            // Log to stdout.
            if !self.colour { println!("{}", msg); }
            else {
                // Colourising is only done for terminals.
                println!(
                    "\x1B[0m{}{}\x1B[0m\x1B[2m\t{}\x1B[1m\n\t\t-- {}\x1B[0m\n",
                    match record.level() {
                        Level::Error => "\x1B[31m\x1B[1m", // Bold, red.
                        Level::Warn  => "\x1B[33m\x1B[1m", // Bold, yellow.
                        Level::Info  => "\x1B[32m\x1B[1m", // Bold, green.
                        _            => "\x1B[34m\x1B[1m", // Bold, blue.
                    }, record.level(), loc, fmt
                );
            }
        }
    }

    fn flush(&self) {
        if let Some(f) = self.file.as_ref() {
            f.lock().unwrap().flush().unwrap_or(());
        }
    }
}


pub fn init_with(file: &Path, verbose: bool, colour: bool) -> Result<(), SetLoggerError> {
    let logger = ConsoleFileLogger {
        file: File::create(file).ok().map(Mutex::new),
        verbose,
        colour,
    };
    set_boxed_logger(Box::new(logger))?;
    set_max_level(LevelFilter::Trace);
    Ok(())
}
