/*!
# vcd-devkit - fakes and helpers for testing vcd-exporter

- `FakeConnector`/`FakeSession`: in-memory inventory behind the session seam,
  with injectable failures, hangs and login/logout accounting
- `fixtures`: record builders and the reference inventory tree
- `test_utils`: tracing setup and sample lookups
*/

pub mod fake_inventory;
pub mod fixtures;
pub mod test_utils;

pub use fake_inventory::{FakeAppGroup, FakeConnector, FakeInventory, FakeOrg, FakeSession, FakeVdc, Fault, Op};
pub use fixtures::{sample_inventory, sample_inventory_for, target};
