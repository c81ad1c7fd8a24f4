use super::load_context;
use crate::errors::Result;
use crate::stack::BranchGraph;

pub fn run() -> Result<()> {
    let ctx = load_context()?;
    let graph = BranchGraph::load(&ctx.store, &ctx.repo)?;

    println!("{} (trunk)", ctx.store.trunk());
    for name in graph.all() {
        let Some(info) = graph.lookup(&name) else {
            continue;
        };
        let base_head = ctx.repo.peel_to_commit(&info.base)?;
        let restacked = ctx.repo.is_ancestor(&base_head, &info.head)?;

        let depth = 1 + graph.downstack(&name).len();
        let marker = if restacked { "" } else { " (needs restack)" };
        println!("{}{} (base: {}){}", "  ".repeat(depth), name, info.base, marker);
    }

    Ok(())
}
