//! Per-translation-unit orchestration: SSA construction through assembly emission. Parsing, name
//! resolution, and type checking are an external collaborator's job and produce the [`Cfg`] this
//! module is handed; linking multiple units together is [`link`], called once after every unit
//! has been assembled.

use anyhow::{bail, Context, Result};
use codegen::ir::Cfg;
use codegen::isa::mir::MachineObject;
use codegen::isa::x86::select_function;
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

/// The result of compiling one translation unit down to text assembly, ready to hand to the
/// system assembler.
pub struct CompiledUnit {
    pub assembly: String,
}

/// Run SSA construction + trivial DCE (unless `opt_level == 0`), then instruction selection and
/// register allocation for every defined function, then assembly emission. `dump_siir` prints the
/// post-construction IR to stderr before selection; `dump_machine_ir` prints each function's
/// selected machine IR to stderr before register allocation.
pub fn compile(cfg: &mut Cfg, opt_level: u8, dump_siir: bool, dump_machine_ir: bool) -> Result<CompiledUnit> {
    let start = Instant::now();

    if opt_level > 0 {
        frontend::promote_locals(cfg);
        codegen::dce::run(cfg);
    } else {
        debug!("opt-level 0: skipping SSA construction and trivial DCE for `{}`", cfg.input_file);
    }
    if dump_siir {
        eprintln!("{cfg}");
    }

    let target = cfg.target.clone();
    let defined: Vec<_> = cfg
        .functions()
        .filter(|(_, f)| !f.is_declaration())
        .map(|(f, _)| f)
        .collect();

    let mut object = MachineObject { source_file: cfg.input_file.clone(), functions: Vec::new() };
    for f in defined {
        let func = cfg.function(f);
        let external = func.linkage == codegen::ir::Linkage::External;
        let mut mf = select_function(cfg, func, &func.name, external, &target)
            .with_context(|| format!("selecting instructions for `{}`", func.name))?;
        if dump_machine_ir {
            eprintln!("{mf}");
        }
        codegen::regalloc::allocate_registers(func, &mut mf)
            .with_context(|| format!("allocating registers for `{}`", func.name))?;
        object.functions.push(mf);
    }

    let assembly = codegen::binemit::emit_object(cfg, &object);
    info!("compiled `{}` in {:?}", cfg.input_file, start.elapsed());
    Ok(CompiledUnit { assembly })
}

/// Write the unit's assembly to `<path>.s` and invoke the system assembler to produce `<path>.o`,
/// returning the object file's path. Deletes the `.s` file unless `keep_asm` is set.
pub fn assemble(path: &Path, unit: &CompiledUnit, keep_asm: bool) -> Result<PathBuf> {
    let asm_path = path.with_extension("s");
    let obj_path = path.with_extension("o");
    std::fs::write(&asm_path, &unit.assembly)
        .with_context(|| format!("writing {}", asm_path.display()))?;

    let output = Command::new("as")
        .arg("-o")
        .arg(&obj_path)
        .arg(&asm_path)
        .output()
        .context("invoking the system assembler (`as`)")?;
    if !output.status.success() {
        bail!(
            "assembler exited with status {}: {}",
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stderr)
        );
    }

    if !keep_asm {
        std::fs::remove_file(&asm_path).with_context(|| format!("removing {}", asm_path.display()))?;
    }
    Ok(obj_path)
}

/// Link every object file into `output`, via `ld -nostdlib`, optionally prepending a runtime
/// object ahead of the translation units' own objects.
pub fn link(objects: &[PathBuf], output: &Path, runtime_obj: Option<&Path>) -> Result<()> {
    let mut cmd = Command::new("ld");
    cmd.arg("-nostdlib").arg("-o").arg(output);
    if let Some(rt) = runtime_obj {
        cmd.arg(rt);
    }
    cmd.args(objects);

    let result = cmd.output().context("invoking the linker (`ld`)")?;
    if !result.status.success() {
        bail!(
            "linker exited with status {}: {}",
            result.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&result.stderr)
        );
    }
    Ok(())
}
