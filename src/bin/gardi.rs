use anyhow::Result;
use gardi::cli::{actions, start};

fn main() -> Result<()> {
    let invocation = start()?;
    actions::handle(invocation)
}
