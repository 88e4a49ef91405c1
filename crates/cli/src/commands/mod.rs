// SPDX-License-Identifier: MIT

pub mod run;
