//! Shader Template Manager
//!
//! Loads embedded WGSL skeletons, renders generated code chunks with
//! minijinja, and provides a shader module cache keyed by the final source.
//!
//! | Function | Use case | Source |
//! |--------|----------|--------|
//! | [`load_template`] | Stage skeletons with substitution markers | raw WGSL |
//! | [`render_chunk`]  | Uniform blocks, vertex input structs      | minijinja template |

use minijinja::{Environment, Error, ErrorKind, syntax::SyntaxConfig};
use rust_embed::RustEmbed;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::borrow::Cow;
use std::sync::OnceLock;
use xxhash_rust::xxh3::xxh3_128;

use super::shader_template::ShaderTemplate;
use crate::errors::{RenderError, Result};
use crate::renderer::core::device::{GpuDevice, ShaderModuleId};

pub static SHADER_ENV: OnceLock<Environment<'static>> = OnceLock::new();

#[derive(RustEmbed)]
#[folder = "src/renderer/pipeline/shaders"]
struct ShaderAssets;

pub fn get_env() -> &'static Environment<'static> {
    SHADER_ENV.get_or_init(|| {
        let mut env = Environment::new();

        match SyntaxConfig::builder()
            .block_delimiters("{$", "$}")
            .variable_delimiters("{{", "}}")
            .line_statement_prefix("$$")
            .build()
        {
            Ok(syntax) => env.set_syntax(syntax),
            Err(e) => log::error!("Failed to configure shader template syntax: {e}"),
        }

        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_undefined_behavior(minijinja::UndefinedBehavior::SemiStrict);

        env.set_loader(shader_loader);

        env
    })
}

fn file_name(name: &str) -> Cow<'_, str> {
    if std::path::Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wgsl"))
    {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("{name}.wgsl"))
    }
}

fn embedded_source(name: &str) -> Option<String> {
    let file = ShaderAssets::get(&file_name(name))?;
    std::str::from_utf8(file.data.as_ref())
        .ok()
        .map(str::to_string)
}

fn shader_loader(name: &str) -> std::result::Result<Option<String>, Error> {
    match ShaderAssets::get(&file_name(name)) {
        Some(file) => std::str::from_utf8(file.data.as_ref())
            .map(|s| Some(s.to_string()))
            .map_err(|e| Error::new(ErrorKind::InvalidOperation, format!("{name}: {e}"))),
        None => Ok(None),
    }
}

/// Loads a stage skeleton such as `"polydata.vert"` and checks its markers.
pub fn load_template(name: &str) -> Result<ShaderTemplate> {
    let source =
        embedded_source(name).ok_or_else(|| RenderError::TemplateNotFound(name.to_string()))?;
    ShaderTemplate::parse(name, source)
}

/// Renders `chunks/<name>.wgsl` with the given context.
pub fn render_chunk<S: Serialize>(name: &str, ctx: S) -> Result<String> {
    let path = format!("chunks/{name}");
    let template = get_env().get_template(&path).map_err(|e| {
        if e.kind() == ErrorKind::TemplateNotFound {
            RenderError::TemplateNotFound(path.clone())
        } else {
            RenderError::Template(e)
        }
    })?;
    Ok(template.render(ctx)?)
}

// ─── ShaderManager ────────────────────────────────────────────────────────────

/// Shader module cache.
///
/// Deduplicates compiled modules by hashing the **final** WGSL source with
/// xxh3-128, so pipelines whose generated stages happen to be identical share
/// one module even when their keys differ.
#[derive(Debug, Default)]
pub struct ShaderManager {
    /// xxh3-128 of final WGSL → compiled module.
    module_cache: FxHashMap<u128, ShaderModuleId>,
    debug_shaders: bool,
}

impl ShaderManager {
    #[must_use]
    pub fn new(debug_shaders: bool) -> Self {
        Self {
            module_cache: FxHashMap::default(),
            debug_shaders,
        }
    }

    /// Returns the cached module for `source`, compiling it on first use.
    pub fn get_or_create_module<D: GpuDevice>(
        &mut self,
        device: &mut D,
        label: &str,
        source: &str,
    ) -> Result<ShaderModuleId> {
        let hash = xxh3_128(source.as_bytes());
        if let Some(&id) = self.module_cache.get(&hash) {
            log::trace!("Shader module cache hit: {label}");
            return Ok(id);
        }

        if self.debug_shaders {
            Self::debug_print_shader(label, source);
        }

        let id = device.create_shader_module(label, source)?;
        log::debug!("Compiled shader module '{label}' ({hash:032x})");
        self.module_cache.insert(hash, id);
        Ok(id)
    }

    #[must_use]
    pub fn module_count(&self) -> usize {
        self.module_cache.len()
    }

    fn debug_print_shader(label: &str, source: &str) {
        let numbered: String = source
            .lines()
            .enumerate()
            .map(|(i, line)| format!("{:4} | {line}\n", i + 1))
            .collect();
        log::trace!("==== {label} ====\n{numbered}");
    }
}
