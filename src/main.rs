// Copyright 2025 the Snapbooth Authors
// SPDX-License-Identifier: Apache-2.0

//! Snapbooth: render a stored booth session to PNG, or run the booth

fn main() -> anyhow::Result<()> {
    snapbooth::run(std::env::args().skip(1))
}
