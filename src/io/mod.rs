// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! I/O module - STL loading and report export

mod report;
mod stl;

pub use report::{export_report_json, report_to_json};
pub use stl::{load_stl, read_stl, write_stl, write_stl_to};
