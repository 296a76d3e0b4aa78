//! YAML scenario parser and executor
//!
//! A scenario is a spec written as data. Steps are tagged by `action`
//! (snake_case) and map one to one onto the operation catalogue:
//! - amounts may be YAML numbers or strings (`"1000000000000"`)
//! - no `_` or `~` in numbers
//! - transaction steps take `payer`, `signers`, `also_signing_with`, `memo`,
//!   `precheck`, `status`, `via` and `logged`
//!
//! ## Example Scenario
//!
//! ```yaml
//! name: "mint through the precompile"
//! given:
//!   - action: new_key
//!     name: supplyKey
//!   - action: crypto_create
//!     name: treasury
//!     balance: "10000000000"
//!   - action: token_create
//!     name: token
//!     treasury: treasury
//!     initial_supply: 1000
//!     supply_key: supplyKey
//!   - action: contract_create
//!     name: minter
//!     program: MintContract
//!     constructor_args:
//!       - address: token
//! when:
//!   - action: contract_call
//!     contract: minter
//!     function: mintFungibleToken
//!     args:
//!       - uint: 10
//!     also_signing_with: [supplyKey]
//!     via: mintTxn
//! then:
//!   - action: assert_child_records
//!     txn: mintTxn
//!     parent_status: SUCCESS
//!     children:
//!       - status: SUCCESS
//!   - action: assert_token_info
//!     token: token
//!     total_supply: "1010"
//! ```

pub mod executor;
pub mod parser;

pub use executor::{load_scenario_file, scenario_to_spec, ScenarioExecutor};
pub use parser::{parse_scenario, Step, TestScenario};
