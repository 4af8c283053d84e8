use clap::{value_parser, crate_version, Arg, ArgAction, Command, ValueHint};

const NAME_HELP: &str = "names are matched as PETSCII bytes, unshifted letters should be typed in upper case;
arbitrary bytes can be given as hex escapes, e.g., `\\xA0`";
const T_LONG_HELP: &str = "The file type stored in the directory entry.
Types that are not given default to `prg`.";
const TRACKS_LONG_HELP: &str = "Number of tracks, only needed when the image type allows more than one,
i.e., a D64 can have 35 or 40 tracks.";

fn file_arg(help: &'static str, req: bool) -> Arg {
    Arg::new("file").short('f').long("file").value_name("NAME").required(req).help(help)
}

fn indent_arg() -> Arg {
    Arg::new("indent").long("indent").help("JSON indentation, omit to minify")
        .value_name("SPACES")
        .value_parser(value_parser!(u16).range(0..16))
        .required(false)
}

fn dimg_arg(req: bool) -> Arg {
    Arg::new("dimg").short('d').long("dimg").help("path to disk image itself")
        .value_name("PATH")
        .value_hint(ValueHint::FilePath)
        .required(req)
}

fn unit_arg() -> Arg {
    Arg::new("unit").long("unit").short('u').help("device number reported in the logs")
        .value_name("UNIT")
        .value_parser(value_parser!(u8).range(8..=30))
        .required(false)
        .default_value("8")
}

pub fn build_cli() -> Command {
    let long_help = "cbmdrive is always invoked with exactly one of several subcommands.
Each subcommand attaches the disk image to a virtual drive and talks to it the way a
computer on the serial bus would.  When the drive reports an error the text of the
error channel is logged and the subcommand fails.
Set RUST_LOG environment variable to control logging level.
  levels: trace,debug,info,warn,error

Examples:
---------
create D64 image:      `cbmdrive mkdsk -t d64 -v GAMES,01 -d games.d64`
directory listing:     `cbmdrive catalog -d games.d64`
copy a file out:       `cbmdrive get -f HELLO -d games.d64 > hello.prg`
copy a file in:        `cat hello.prg | cbmdrive put -f HELLO -t prg -d games.d64`
DOS command:           `cbmdrive cmd -c \"S:OLD*\" -d games.d64`
look at the BAM:       `cbmdrive block -t 18 -s 0 -d games.d64`";

    let img_types = ["d64", "d71", "d81", "d80", "d82"];
    let file_types = ["prg", "seq", "usr"];

    let mut main_cmd = Command::new("cbmdrive")
        .about("Virtual CBM-DOS drive for D64, D71, D81, D80 and D82 disk images.")
        .after_long_help(long_help)
        .version(crate_version!());

    main_cmd = main_cmd.subcommand(
        Command::new("mkdsk")
            .arg(Arg::new("volume").long("volume").short('v').value_name("NAME,ID").help("disk name and id")
                .required(true))
            .arg(Arg::new("type").long("type").short('t').value_name("TYPE").help("type of disk image to create")
                .required(true)
                .value_parser(img_types),
            )
            .arg(Arg::new("tracks").long("tracks").value_name("TRACKS").help("number of tracks")
                .long_help(TRACKS_LONG_HELP)
                .value_parser(value_parser!(u8))
                .required(false)
            )
            .arg(dimg_arg(true).help("disk image path to create"))
            .arg(unit_arg())
            .visible_alias("mkimg")
            .about("write a new formatted disk image to the given path")
    );
    main_cmd = main_cmd.subcommand(
        Command::new("get")
            .arg(file_arg("name of the file inside the disk image",true).long_help(NAME_HELP))
            .arg(dimg_arg(true))
            .arg(unit_arg())
            .about("read a file from a disk image, write to stdout")
            .after_help("a hex dump is shown if stdout is the console")
    );
    main_cmd = main_cmd.subcommand(
        Command::new("put")
            .arg(file_arg("name of the new file inside the disk image",true).long_help(NAME_HELP))
            .arg(Arg::new("type").long("type").short('t').help("type of the file")
                .value_name("TYPE").required(false).value_parser(file_types).long_help(T_LONG_HELP)
                .default_value("prg")
            )
            .arg(Arg::new("replace").long("replace").help("replace an existing file with the same name").action(ArgAction::SetTrue))
            .arg(dimg_arg(true))
            .arg(unit_arg())
            .about("read from stdin, write a file to the disk image")
    );
    main_cmd = main_cmd.subcommand(
        Command::new("delete")
            .arg(file_arg("name or pattern of files to delete",true).long_help(NAME_HELP))
            .arg(dimg_arg(true))
            .arg(unit_arg())
            .visible_alias("del")
            .visible_alias("scratch")
            .about("scratch files inside a disk image"),
    );
    main_cmd = main_cmd.subcommand(
        Command::new("rename")
            .arg(file_arg("name of the file to rename",true))
            .arg(Arg::new("name").long("name").short('n').value_name("NAME").help("new name").required(true))
            .arg(dimg_arg(true))
            .arg(unit_arg())
            .about("rename a file inside a disk image"),
    );
    main_cmd = main_cmd.subcommand(
        Command::new("validate")
            .arg(dimg_arg(true))
            .arg(unit_arg())
            .visible_alias("collect")
            .about("rebuild the BAM from the directory, deleting unclosed files"),
    );
    main_cmd = main_cmd.subcommand(
        Command::new("cmd")
            .arg(Arg::new("command").long("command").short('c').value_name("TEXT").help("DOS command to send")
                .required(true)
                .long_help("The text is sent to the command channel as is, arbitrary bytes can be given as hex escapes, e.g., `\\x0D`"))
            .arg(dimg_arg(true))
            .arg(unit_arg())
            .about("send a command to the drive and write the error channel to stdout"),
    );
    main_cmd = main_cmd.subcommand(
        Command::new("catalog")
            .arg(file_arg("pattern to match, wildcards `*` and `?` are allowed",false))
            .arg(dimg_arg(true))
            .arg(unit_arg())
            .visible_alias("dir")
            .visible_alias("ls")
            .about("write the directory listing to stdout"),
    );
    main_cmd = main_cmd.subcommand(
        Command::new("block")
            .arg(Arg::new("track").long("track").short('t').value_name("TRACK").help("track number, starting from 1")
                .value_parser(value_parser!(u8))
                .required(true))
            .arg(Arg::new("sector").long("sector").short('s').value_name("SECTOR").help("sector number, starting from 0")
                .value_parser(value_parser!(u8))
                .required(true))
            .arg(dimg_arg(true))
            .arg(unit_arg())
            .about("read one block through a buffer channel, write to stdout")
            .after_help("a hex dump is shown if stdout is the console")
    );
    main_cmd = main_cmd.subcommand(
        Command::new("info")
            .arg(dimg_arg(true))
            .arg(indent_arg())
            .arg(unit_arg())
            .visible_alias("stat")
            .about("write disk and directory information as a JSON string to stdout"),
    );
    main_cmd = main_cmd.subcommand(
        Command::new("completions")
            .arg(
                Arg::new("shell").short('s').long("shell").help("shell target").value_name("NAME")
                    .required(true)
                    .value_parser(["bash","elv","fish","ps1","zsh"])
            )
            .about("write completions script to stdout for the specified shell")
    );
    return main_cmd;
}
