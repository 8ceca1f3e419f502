use clap::{value_parser, crate_version, Arg, ArgAction, Command, ValueHint};

const ORDER_LONG_HELP: &str = "Arrangement of sectors within each track of the output.
`auto` goes by the output extension (po, do, dsk, d13) if it suits the disk,
otherwise 16 sector disks are DOS ordered, 13 sector disks are physically ordered,
and 3.5 inch disks are ProDOS (block) ordered.";

fn indent_arg() -> Arg {
    Arg::new("indent").long("indent").help("JSON indentation, omit to minify")
        .value_name("SPACES")
        .value_parser(value_parser!(u16).range(0..16))
        .required(false)
}

fn order_arg() -> Arg {
    Arg::new("order").short('o').long("order").help("sector order of the flat image")
        .long_help(ORDER_LONG_HELP)
        .value_name("ORDER")
        .value_parser(["auto","dos","prodos","physical"])
        .required(false)
        .default_value("auto")
}

const MARK_LONG_HELP: &str = "Hex bytes that replace a standard sector mark, e.g., D5AA96.
Only the first two bytes of an epilog have to match.";

fn parse_mark(s: &str) -> Result<Vec<u8>,String> {
    hex::decode(s).map_err(|e| e.to_string())
}

fn mark_arg(id: &'static str,help: &'static str) -> Arg {
    Arg::new(id).long(id).help(help)
        .long_help(MARK_LONG_HELP)
        .value_name("HEX")
        .value_parser(parse_mark)
        .required(false)
        .conflicts_with("meta")
}

pub fn build_cli() -> Command {
    let long_help = "woz2dsk reads a WOZ (1 or 2) image of an unprotected Apple disk and writes
a flat sector image.  Sectors that cannot be recovered are zero filled and reported
on stderr, one line per sector.
Set RUST_LOG environment variable to control logging level.
  levels: trace,debug,info,warn,error

Examples:
---------
DOS ordered image:     `woz2dsk mydisk.woz mydisk.do`
ProDOS ordered image:  `woz2dsk mydisk.woz mydisk.dsk --order prodos`
fail on bad sectors:   `woz2dsk mydisk.woz mydisk.po --strict`
odd data prolog:       `woz2dsk mydisk.woz mydisk.do --data-prolog D5AADA`
show metadata:         `woz2dsk mydisk.woz --meta --indent 4`";

    Command::new("woz2dsk")
        .about("Converts WOZ disk images to flat sector images.")
        .after_long_help(long_help)
        .version(crate_version!())
        .arg(Arg::new("input").help("path to the WOZ image")
            .value_name("INPUT")
            .value_hint(ValueHint::FilePath)
            .required(true))
        .arg(Arg::new("output").help("path to the flat image to write")
            .value_name("OUTPUT")
            .value_hint(ValueHint::FilePath)
            .required_unless_present("meta")
            .conflicts_with("meta"))
        .arg(order_arg())
        .arg(Arg::new("strict").long("strict").help("exit with an error if any sector was zero filled")
            .action(ArgAction::SetTrue))
        .arg(mark_arg("addr-prolog","custom address prolog"))
        .arg(mark_arg("addr-epilog","custom address epilog"))
        .arg(mark_arg("data-prolog","custom data prolog"))
        .arg(mark_arg("data-epilog","custom data epilog"))
        .arg(Arg::new("meta").long("meta").help("print INFO and META as JSON instead of converting")
            .action(ArgAction::SetTrue))
        .arg(indent_arg().requires("meta"))
}
