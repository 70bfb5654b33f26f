/*
 * SPDX-FileCopyrightText: 2025 Inria
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use nlinkgraph_cli::{cli_main, exit_code, init_env_logger};

pub fn main() {
    // Initialize the logger
    if let Err(error) = init_env_logger() {
        eprintln!("Could not initialize the logger: {}", error);
        std::process::exit(1);
    }
    // Call the main function of the CLI with cli args
    if let Err(error) = cli_main(std::env::args_os()) {
        log::error!("{:#}", error);
        std::process::exit(exit_code(&error));
    }
}
