use anyhow::Result;

use crate::cli::BatchArgs;
use crate::commands::{finish, open_batch};
use crate::pipeline::{Direction, Pipeline};
use crate::resolver::LocalMover;

pub fn run(args: BatchArgs, direction: Direction) -> Result<()> {
    let batch = open_batch(&args)?;
    let mut pipeline = Pipeline::new(&batch.root, &batch.layout, &batch.table.records, &LocalMover);
    pipeline.move_photos(direction);

    let step = match direction {
        Direction::IntoUnitFolders => "move-photos",
        Direction::BackToRoot => "move-back",
    };
    finish(step, pipeline.report())
}
