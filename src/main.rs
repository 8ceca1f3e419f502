//! # Command Line Interface
//!
//! Reads the WOZ image, converts it, and writes the flat image.
//! Diagnostics go to stderr, one line per zero filled sector.

use env_logger;
use std::str::FromStr;
use log::{error,info};
use woz2dsk::img::dsk::SectorOrder;
use woz2dsk::img::tracks::formats::SectorMarks;
use woz2dsk::STDRESULT;

mod cli;

const RCH: &str = "unreachable was reached";

fn main() -> STDRESULT
{
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let matches = cli::build_cli().get_matches();
    let img_path = matches.get_one::<String>("input").expect(RCH);
    let woz = match woz2dsk::create_woz_from_file(img_path) {
        Ok(woz) => woz,
        Err(e) => {
            error!("could not read {}: {}",img_path,e);
            return Err(e);
        }
    };

    if matches.get_flag("meta") {
        let indent = matches.get_one::<u16>("indent").copied();
        println!("{}",woz.get_metadata(indent));
        return Ok(());
    }

    let out_path = matches.get_one::<String>("output").expect(RCH);
    let order = match matches.get_one::<String>("order").map(|s| s.as_str()) {
        Some("auto") | None => SectorOrder::auto(woz.disk(),woz2dsk::flat_extension(out_path).as_deref()),
        Some(s) => SectorOrder::from_str(s)?
    };
    let marks = SectorMarks {
        addr_prolog: matches.get_one::<Vec<u8>>("addr-prolog").cloned(),
        addr_epilog: matches.get_one::<Vec<u8>>("addr-epilog").cloned(),
        data_prolog: matches.get_one::<Vec<u8>>("data-prolog").cloned(),
        data_epilog: matches.get_one::<Vec<u8>>("data-epilog").cloned()
    };
    let conversion = woz2dsk::convert_woz_with_marks(&woz,Some(order),&marks)?;
    for diag in &conversion.diagnostics {
        eprintln!("{}",diag);
    }
    std::fs::write(out_path,&conversion.image)?;
    info!("wrote {} bytes to {}",conversion.image.len(),out_path);
    if matches.get_flag("strict") && conversion.diagnostics.len() > 0 {
        eprintln!("{} sectors could not be recovered",conversion.diagnostics.len());
        std::process::exit(1);
    }
    Ok(())
}
