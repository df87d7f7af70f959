//! Handler for `pallet show`.

use std::path::Path;

use miette::Result;

use pallet_core::universe::Universe;
use pallet_resolver::dump::Dump;
use pallet_resolver::serialise::deserialise;
use pallet_resolver::ResolverLists;

pub fn exec(universe: &Path, plan: &Path) -> Result<()> {
    let universe = Universe::load(universe)?;
    let text = pallet_util::fs::read_to_string(plan, "plan")?;
    let lists: ResolverLists = deserialise(&universe, &text)?;
    print!("{}", Dump::new(&lists));
    Ok(())
}
