//! Handler for `pallet check`.

use std::path::Path;

use miette::Result;

use pallet_core::environment::Environment;
use pallet_core::universe::Universe;
use pallet_util::progress;

pub fn exec(universe: &Path) -> Result<()> {
    let u = Universe::load(universe)?;
    progress::status(
        "Checked",
        &format!(
            "{} repositories, {} packages, {} ids, {} sets",
            u.repositories().len(),
            u.package_names().count(),
            u.id_count(),
            u.set_count()
        ),
    );
    Ok(())
}
