use anyhow::Result;

use crate::cli::BatchArgs;
use crate::commands::{finish, open_batch};
use crate::pipeline::Pipeline;
use crate::resolver::LocalMover;

pub fn run(args: BatchArgs) -> Result<()> {
    let batch = open_batch(&args)?;
    let mut pipeline = Pipeline::new(&batch.root, &batch.layout, &batch.table.records, &LocalMover);
    pipeline.ensure_folders();
    finish("folders", pipeline.report())
}
