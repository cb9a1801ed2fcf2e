//! The CFG: the top-level container owning every interned type/constant, every global, and every
//! function in a translation unit.

use crate::ir::constant::ConstantPool;
use crate::ir::entities::{Func, Global, Value};
use crate::ir::function::Function;
use crate::ir::global::GlobalData;
use crate::ir::types::TypePool;
use crate::ir::value::ValueData;
use crate::target::Target;
use entity::PrimaryMap;
use std::collections::HashMap;

/// The in-memory control-flow graph holding all IR for one translation unit.
///
/// Owns the type pool, the constant pool, every global, and every function; dropping a `Cfg`
/// drops everything reachable from it. There is one `Cfg` per input file.
pub struct Cfg {
    pub input_file: String,
    pub target: Target,
    pub types: TypePool,
    pub constants: ConstantPool,

    globals: PrimaryMap<Global, GlobalData>,
    globals_by_name: HashMap<String, Global>,

    functions: PrimaryMap<Func, Function>,
    functions_by_name: HashMap<String, Func>,
}

impl Cfg {
    pub fn new(input_file: impl Into<String>, target: Target) -> Self {
        Self {
            input_file: input_file.into(),
            target,
            types: TypePool::new(),
            constants: ConstantPool::new(),
            globals: PrimaryMap::new(),
            globals_by_name: HashMap::new(),
            functions: PrimaryMap::new(),
            functions_by_name: HashMap::new(),
        }
    }

    pub fn declare_global(&mut self, data: GlobalData) -> Global {
        let name = data.name.clone();
        let g = self.globals.push(data);
        self.globals_by_name.insert(name, g);
        g
    }

    pub fn global_by_name(&self, name: &str) -> Option<Global> {
        self.globals_by_name.get(name).copied()
    }

    pub fn global(&self, g: Global) -> &GlobalData {
        &self.globals[g]
    }

    pub fn globals(&self) -> impl Iterator<Item = (Global, &GlobalData)> {
        self.globals.iter()
    }

    pub fn declare_function(&mut self, func: Function) -> Func {
        let name = func.name.clone();
        let f = self.functions.push(func);
        self.functions_by_name.insert(name, f);
        f
    }

    pub fn function_by_name(&self, name: &str) -> Option<Func> {
        self.functions_by_name.get(name).copied()
    }

    pub fn function(&self, f: Func) -> &Function {
        &self.functions[f]
    }

    pub fn function_mut(&mut self, f: Func) -> &mut Function {
        &mut self.functions[f]
    }

    /// Split borrow of a function alongside the pools the builder needs to materialize constants
    /// and block addresses while building into it.
    pub fn function_and_pools(&mut self, f: Func) -> (&mut Function, &mut TypePool, &mut ConstantPool) {
        (&mut self.functions[f], &mut self.types, &mut self.constants)
    }

    pub fn functions(&self) -> impl Iterator<Item = (Func, &Function)> {
        self.functions.iter()
    }

    pub fn functions_mut(&mut self) -> impl Iterator<Item = (Func, &mut Function)> {
        self.functions.iter_mut()
    }
}

/// A plain textual rendering for `--dump-siir`: every function in declaration order, via
/// [`Function`]'s own `Display`.
impl std::fmt::Display for Cfg {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for (i, (_, func)) in self.functions().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{func}")?;
        }
        Ok(())
    }
}

/// Mint (or fetch, if already minted in this function) the `Value` referring to `global` within
/// `func`'s value graph. Globals are unit-wide but values are per-function, so each function that
/// references a global gets its own `Value` wrapping the same `Global` entity.
pub fn global_value(func: &mut Function, global: Global, ptr_ty: crate::ir::entities::Type) -> Value {
    func.values.make(ValueData::Global(global), Some(ptr_ty))
}

/// Mint the `Value` referring to `callee` within `func`'s value graph, for use as a `call`
/// instruction's callee operand.
pub fn function_value(func: &mut Function, callee: crate::ir::entities::Func, ptr_ty: crate::ir::entities::Type) -> Value {
    func.values.make(ValueData::Function(callee), Some(ptr_ty))
}
