pub mod backup;

use crate::backup::coordinator::RunSummary;

pub const EXIT_OK: i32 = 0;
pub const EXIT_TARGET_FAILED: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

pub fn exit_code_for(summary: &RunSummary) -> i32 {
    if summary.failed > 0 {
        EXIT_TARGET_FAILED
    } else {
        EXIT_OK
    }
}
