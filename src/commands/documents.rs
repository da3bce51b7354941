use anyhow::Result;

use crate::cli::BatchArgs;
use crate::commands::{finish, open_batch};
use crate::pipeline::Pipeline;
use crate::resolver::LocalMover;

pub fn render(args: BatchArgs) -> Result<()> {
    let batch = open_batch(&args)?;
    let mut pipeline = Pipeline::new(&batch.root, &batch.layout, &batch.table.records, &LocalMover);
    pipeline.render_documents();
    finish("render", pipeline.report())
}

pub fn place(args: BatchArgs) -> Result<()> {
    let batch = open_batch(&args)?;
    let mut pipeline = Pipeline::new(&batch.root, &batch.layout, &batch.table.records, &LocalMover);
    pipeline.place_documents();
    finish("move-docs", pipeline.report())
}
