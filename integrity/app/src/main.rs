/*++

Licensed under the Apache-2.0 license.

File Name:

   main.rs

Abstract:

    Main entry point of the Cryptolith integrity precompute tool.

--*/
use std::path::PathBuf;

use clap::{arg, value_parser, Command};

mod precalc;

/// Entry point
fn main() {
    let image_arg = || {
        arg!(--"image" <FILE> "Mach-O binary")
            .required(true)
            .value_parser(value_parser!(PathBuf))
    };
    let max_offset_arg = || {
        arg!(--"max-offset" <USIZE> "Bound on the image region the walk may touch")
            .required(false)
            .value_parser(value_parser!(usize))
    };

    let sub_cmds = vec![
        Command::new("compute")
            .about("Compute the code-section MAC of a binary")
            .arg(image_arg())
            .arg(max_offset_arg()),
        Command::new("patch")
            .about("Embed the computed MAC into the binary's precalc slot")
            .arg(image_arg())
            .arg(max_offset_arg())
            .arg(
                arg!(--"out" <FILE> "Output file")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            ),
        Command::new("verify")
            .about("Check the embedded MAC against the computed one")
            .arg(image_arg())
            .arg(max_offset_arg()),
    ];

    let cmd = Command::new("cryptolith-integrity-app")
        .arg_required_else_help(true)
        .subcommands(sub_cmds)
        .about("Cryptolith integrity precompute tools")
        .get_matches();

    let result = match cmd.subcommand().unwrap() {
        ("compute", args) => precalc::run_compute(args),
        ("patch", args) => precalc::run_patch(args),
        ("verify", args) => precalc::run_verify(args),
        (_, _) => unreachable!(),
    };

    result.unwrap();
}
