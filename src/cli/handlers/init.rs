use std::path::PathBuf;

use crate::cli::commands::InitArgs;
use crate::io::config_io;

/// Create the data directory: the `-C` path if given, else
/// `./.taskmaster/`.
pub fn cmd_init(args: InitArgs, data_dir: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let data_dir = match data_dir {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir()?.join(config_io::DATA_DIR_NAME),
    };
    config_io::init_data_dir(&data_dir, args.force)?;
    println!("initialized {}", data_dir.display());
    Ok(())
}
