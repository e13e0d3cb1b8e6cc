//! Machine registry served by `pathrpc serve`.
//!
//! The root exposes `Ping`, `Echo`, `Caller`, `AddMachine`, `Machines` and
//! `Machine-<id>`; a machine exposes `Id`, `Info`, `Life`,
//! `SetAgentVersion` and `Destroy`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use pathrpc_dispatch::{CallError, Context, Registry, Server, Value};
use serde::{Deserialize, Serialize};

/// Per-connection description of who is calling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Life {
    Alive,
    Dying,
    Dead,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MachineInfo {
    pub id: String,
    pub series: String,
    pub life: Life,
    pub agent_version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AddMachineParams {
    pub series: String,
}

#[derive(Default)]
struct State {
    machines: RwLock<BTreeMap<String, MachineInfo>>,
    next_id: AtomicU64,
}

impl State {
    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, MachineInfo>>, CallError> {
        self.machines
            .read()
            .map_err(|_| "machine table lock poisoned".into())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, MachineInfo>>, CallError> {
        self.machines
            .write()
            .map_err(|_| "machine table lock poisoned".into())
    }
}

/// Root object of the demo facade.
pub struct Root {
    state: Arc<State>,
}

impl Root {
    pub fn new() -> Self {
        Self {
            state: Arc::new(State::default()),
        }
    }

    fn add_machine(&self, params: AddMachineParams) -> Result<MachineInfo, CallError> {
        if params.series.is_empty() {
            return Err("series must not be empty".into());
        }
        let id = self.state.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        let info = MachineInfo {
            id: id.clone(),
            series: params.series,
            life: Life::Alive,
            agent_version: None,
        };
        self.state.write()?.insert(id, info.clone());
        Ok(info)
    }

    fn machine(&self, id: String) -> Result<Arc<Machine>, CallError> {
        if !self.state.read()?.contains_key(&id) {
            return Err(format!("machine {id} not found").into());
        }
        Ok(Arc::new(Machine {
            id,
            state: Arc::clone(&self.state),
        }))
    }
}

impl Default for Root {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle on one machine; reads go to the shared table.
pub struct Machine {
    id: String,
    state: Arc<State>,
}

impl Machine {
    fn info(&self) -> Result<MachineInfo, CallError> {
        self.state
            .read()?
            .get(&self.id)
            .cloned()
            .ok_or_else(|| format!("machine {} not found", self.id).into())
    }

    fn update<F>(&self, f: F) -> Result<(), CallError>
    where
        F: FnOnce(&mut MachineInfo) -> Result<(), CallError>,
    {
        let mut machines = self.state.write()?;
        let info = machines
            .get_mut(&self.id)
            .ok_or_else(|| format!("machine {} not found", self.id))?;
        f(info)
    }
}

pub fn registry() -> Registry {
    let mut builder = Registry::builder();
    builder
        .register::<Root>()
        .getter("Ping", |_, _| Ok("pong".to_string()))
        .method("Echo", |_, _, value: serde_json::Value| Ok(value))
        .getter("Caller", |_, ctx| {
            Ok(ctx.get::<Caller>().map(|caller| caller.0.clone()))
        })
        .method("AddMachine", |root: &Root, _, params: AddMachineParams| {
            root.add_machine(params)
        })
        .getter("Machines", |root: &Root, _| {
            Ok(root.state.read()?.values().cloned().collect::<Vec<_>>())
        })
        .object_by_id("Machine", |root: &Root, _, id| root.machine(id));
    builder
        .register::<Machine>()
        .getter("Id", |machine: &Machine, _| Ok(machine.id.clone()))
        .getter("Info", |machine: &Machine, _| machine.info())
        .getter("Life", |machine: &Machine, _| Ok(machine.info()?.life))
        .action("SetAgentVersion", |machine: &Machine, _, version: String| {
            machine.update(|info| {
                if info.life == Life::Dead {
                    return Err(format!("machine {} is dead", info.id).into());
                }
                info.agent_version = Some(version);
                Ok(())
            })
        })
        .action("Destroy", |machine: &Machine, _, (): ()| {
            machine.update(|info| {
                info.life = match info.life {
                    Life::Alive => Life::Dying,
                    Life::Dying | Life::Dead => Life::Dead,
                };
                Ok(())
            })
        });
    builder.build()
}

/// A server over a fresh, empty machine table.
pub fn server() -> pathrpc_dispatch::Result<Server> {
    Server::new(registry(), Value::new(Root::new()))
}

/// Context for a call arriving from `description`.
pub fn caller_context(description: impl Into<String>) -> Context {
    Context::new(Caller(description.into()))
}
