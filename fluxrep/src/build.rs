/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");

const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
const RUST_VERSION: &str = env!("CARGO_PKG_RUST_VERSION");

const PACKAGE_VERSION: Option<&str> = option_env!("FLUXREP_PACKAGE_VERSION");

pub fn print_version(verbose_level: u8) {
    println!("{PKG_NAME} {VERSION}");
    if verbose_level > 0 {
        println!("{PKG_DESCRIPTION}");
        println!("Minimum Rust Version: {RUST_VERSION}");
    }
    if verbose_level > 1
        && let Some(package_version) = PACKAGE_VERSION
    {
        println!("Package Version: {package_version}");
    }
}
