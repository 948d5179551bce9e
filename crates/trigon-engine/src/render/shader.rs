//! Shader compilation and program linking.
//!
//! WGSL sources are parsed and validated with naga (the compiler wgpu runs
//! internally), then reflected CPU-side so attribute and uniform locations
//! are known before any GPU object exists.

use std::borrow::Cow;
use std::fmt;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};

use naga::valid::{Capabilities, ValidationFlags, Validator};

use super::error::ShaderError;

/// Vertex position input name.
pub const POSITION_ATTRIBUTE: &str = "a_position";
/// Vertex color input name.
pub const COLOR_ATTRIBUTE: &str = "a_color";
/// Combined transform uniform name.
pub const MVP_UNIFORM: &str = "u_mvp";
/// Optional shape-wide color uniform name.
pub const COLOR_UNIFORM: &str = "u_color";

pub const POSITION_LOCATION: u32 = 0;
pub const COLOR_LOCATION: u32 = 1;

const FLAT_VERTEX: &str = include_str!("shaders/flat.vert.wgsl");
const FLAT_FRAGMENT: &str = include_str!("shaders/flat.frag.wgsl");

/// Pipeline stage a shader module is compiled for.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl Stage {
    fn naga(self) -> naga::ShaderStage {
        match self {
            Stage::Vertex => naga::ShaderStage::Vertex,
            Stage::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Vertex => "vertex",
            Stage::Fragment => "fragment",
        })
    }
}

/// Source text for a vertex/fragment pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSources {
    pub vertex: Cow<'static, str>,
    pub fragment: Cow<'static, str>,
}

impl ShaderSources {
    pub fn new(vertex: impl Into<Cow<'static, str>>, fragment: impl Into<Cow<'static, str>>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }

    /// Built-in pair: transform by `u_mvp`, pass the per-vertex color through.
    pub fn flat() -> Self {
        Self::new(FLAT_VERTEX, FLAT_FRAGMENT)
    }
}

impl Default for ShaderSources {
    fn default() -> Self {
        Self::flat()
    }
}

/// A validated single-stage shader module.
#[derive(Debug, Clone)]
pub struct CompiledShader {
    stage: Stage,
    entry_point: String,
    source: String,
    module: naga::Module,
}

impl CompiledShader {
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    fn entry(&self) -> Option<&naga::EntryPoint> {
        self.module
            .entry_points
            .iter()
            .find(|ep| ep.name == self.entry_point)
    }
}

/// Compiles `source` for `stage`.
///
/// The module must parse, validate, and declare exactly one entry point for
/// the requested stage.
pub fn compile(stage: Stage, source: &str) -> Result<CompiledShader, ShaderError> {
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| ShaderError::compilation(stage, e.emit_to_string(source)))?;

    Validator::new(ValidationFlags::all(), Capabilities::default())
        .validate(&module)
        .map_err(|e| ShaderError::compilation(stage, e.emit_to_string(source)))?;

    let mut entries = module
        .entry_points
        .iter()
        .filter(|ep| ep.stage == stage.naga());

    let entry_point = match (entries.next(), entries.next()) {
        (Some(ep), None) => ep.name.clone(),
        (None, _) => {
            return Err(ShaderError::compilation(stage, format!("no {stage} entry point")));
        }
        (Some(_), Some(_)) => {
            return Err(ShaderError::compilation(
                stage,
                format!("more than one {stage} entry point"),
            ));
        }
    };

    Ok(CompiledShader {
        stage,
        entry_point,
        source: source.to_owned(),
        module,
    })
}

/// Name-to-location assignments applied to vertex inputs before linking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeBindings {
    bindings: Vec<(String, u32)>,
}

impl AttributeBindings {
    pub fn empty() -> Self {
        Self { bindings: Vec::new() }
    }

    /// `a_position` at 0, `a_color` at 1.
    pub fn standard() -> Self {
        Self::empty()
            .bind(POSITION_ATTRIBUTE, POSITION_LOCATION)
            .bind(COLOR_ATTRIBUTE, COLOR_LOCATION)
    }

    /// Binds `name` to `location`, replacing an earlier binding of `name`.
    pub fn bind(mut self, name: impl Into<String>, location: u32) -> Self {
        let name = name.into();
        self.bindings.retain(|(n, _)| *n != name);
        self.bindings.push((name, location));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.bindings.iter().map(|(n, l)| (n.as_str(), *l))
    }
}

impl Default for AttributeBindings {
    fn default() -> Self {
        Self::standard()
    }
}

/// Non-zero, process-unique program identity.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ProgramId(NonZeroU32);

impl ProgramId {
    fn next() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(1);
        let raw = NEXT.fetch_add(1, Ordering::Relaxed);
        Self(NonZeroU32::new(raw).unwrap_or(NonZeroU32::MIN))
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "program#{}", self.0)
    }
}

/// Resource slot of a uniform: bind group, binding index and byte size.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct UniformSlot {
    pub group: u32,
    pub binding: u32,
    pub size: u64,
}

/// A uniform declared by the program and the stages that declare it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformInfo {
    pub name: String,
    pub slot: UniformSlot,
    pub vertex: bool,
    pub fragment: bool,
}

/// A vertex shader input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeInfo {
    pub name: String,
    pub location: u32,
    /// Component count when the input is an `f32` scalar or vector.
    pub float_components: Option<u32>,
}

/// A linked vertex + fragment pair with resolved interface.
#[derive(Debug, Clone)]
pub struct ShaderProgram {
    id: ProgramId,
    vertex: CompiledShader,
    fragment: CompiledShader,
    attributes: Vec<AttributeInfo>,
    uniforms: Vec<UniformInfo>,
}

impl ShaderProgram {
    /// Compiles both stages and links them with `bindings`.
    pub fn from_sources(
        sources: &ShaderSources,
        bindings: &AttributeBindings,
    ) -> Result<Self, ShaderError> {
        let vertex = compile(Stage::Vertex, &sources.vertex)?;
        let fragment = compile(Stage::Fragment, &sources.fragment)?;
        link(vertex, fragment, bindings)
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn vertex(&self) -> &CompiledShader {
        &self.vertex
    }

    pub fn fragment(&self) -> &CompiledShader {
        &self.fragment
    }

    pub fn attributes(&self) -> &[AttributeInfo] {
        &self.attributes
    }

    pub fn uniforms(&self) -> &[UniformInfo] {
        &self.uniforms
    }

    pub fn attribute_location(&self, name: &str) -> Option<u32> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.location)
    }

    pub fn uniform_location(&self, name: &str) -> Option<UniformSlot> {
        self.uniforms.iter().find(|u| u.name == name).map(|u| u.slot)
    }
}

/// Links a vertex and a fragment shader.
///
/// Fails when a bound attribute is missing or declared at a different
/// location, when the fragment stage reads a location the vertex stage does
/// not write, or when the stages disagree about a uniform.
pub fn link(
    vertex: CompiledShader,
    fragment: CompiledShader,
    bindings: &AttributeBindings,
) -> Result<ShaderProgram, ShaderError> {
    if vertex.stage != Stage::Vertex || fragment.stage != Stage::Fragment {
        return Err(ShaderError::link(format!(
            "expected vertex + fragment stages, got {} + {}",
            vertex.stage, fragment.stage
        )));
    }

    let (Some(vs), Some(fs)) = (vertex.entry(), fragment.entry()) else {
        return Err(ShaderError::link("entry point vanished after compilation"));
    };

    let inputs = stage_inputs(&vertex.module, vs);
    let outputs = stage_outputs(&vertex.module, vs);
    let fragment_inputs = stage_inputs(&fragment.module, fs);

    let mut attributes = Vec::with_capacity(inputs.len());
    for var in &inputs {
        let Some(name) = var.name.clone() else {
            return Err(ShaderError::link(format!(
                "vertex input at location {} has no name",
                var.location
            )));
        };
        attributes.push(AttributeInfo {
            name,
            location: var.location,
            float_components: float_components(&vertex.module, var.ty),
        });
    }

    let mut bound: Vec<u32> = Vec::new();
    for (name, location) in bindings.iter() {
        if bound.contains(&location) {
            return Err(ShaderError::link(format!(
                "location {location} is bound to more than one attribute"
            )));
        }
        bound.push(location);

        match attributes.iter().find(|a| a.name == name) {
            None => {
                return Err(ShaderError::link(format!("no vertex input named `{name}`")));
            }
            Some(a) if a.location != location => {
                return Err(ShaderError::link(format!(
                    "`{name}` is declared at location {} but bound to {location}",
                    a.location
                )));
            }
            Some(a) if a.float_components.is_none() => {
                return Err(ShaderError::link(format!(
                    "`{name}` must be an f32 scalar or vector; vertex data is f32 only"
                )));
            }
            Some(_) => {}
        }
    }

    for input in &fragment_inputs {
        if !outputs.iter().any(|o| o.location == input.location) {
            return Err(ShaderError::link(format!(
                "fragment input at location {} is not written by the vertex stage",
                input.location
            )));
        }
    }

    let mut uniforms: Vec<UniformInfo> = Vec::new();
    for (stage, module) in [(Stage::Vertex, &vertex.module), (Stage::Fragment, &fragment.module)] {
        for (name, slot) in stage_uniforms(module) {
            merge_uniform(&mut uniforms, name, slot, stage)?;
        }
    }

    let program = ShaderProgram {
        id: ProgramId::next(),
        vertex,
        fragment,
        attributes,
        uniforms,
    };

    log::debug!(
        "linked {} ({} attributes, {} uniforms)",
        program.id,
        program.attributes.len(),
        program.uniforms.len()
    );

    Ok(program)
}

fn merge_uniform(
    uniforms: &mut Vec<UniformInfo>,
    name: String,
    slot: UniformSlot,
    stage: Stage,
) -> Result<(), ShaderError> {
    if let Some(existing) = uniforms.iter_mut().find(|u| u.name == name) {
        if existing.slot != slot {
            return Err(ShaderError::link(format!(
                "uniform `{name}` is declared differently by the two stages"
            )));
        }
        match stage {
            Stage::Vertex => existing.vertex = true,
            Stage::Fragment => existing.fragment = true,
        }
        return Ok(());
    }

    if let Some(clash) = uniforms
        .iter()
        .find(|u| u.slot.group == slot.group && u.slot.binding == slot.binding)
    {
        return Err(ShaderError::link(format!(
            "uniforms `{}` and `{name}` share group {} binding {}",
            clash.name, slot.group, slot.binding
        )));
    }

    uniforms.push(UniformInfo {
        name,
        slot,
        vertex: stage == Stage::Vertex,
        fragment: stage == Stage::Fragment,
    });
    Ok(())
}

// ── reflection ────────────────────────────────────────────────────────────

struct InterfaceVar {
    name: Option<String>,
    location: u32,
    ty: naga::Handle<naga::Type>,
}

fn stage_inputs(module: &naga::Module, ep: &naga::EntryPoint) -> Vec<InterfaceVar> {
    let mut out = Vec::new();
    for arg in &ep.function.arguments {
        collect_locations(module, arg.name.as_ref(), arg.ty, arg.binding.as_ref(), &mut out);
    }
    out
}

fn stage_outputs(module: &naga::Module, ep: &naga::EntryPoint) -> Vec<InterfaceVar> {
    let mut out = Vec::new();
    if let Some(result) = &ep.function.result {
        collect_locations(module, None, result.ty, result.binding.as_ref(), &mut out);
    }
    out
}

/// Flattens location-bound values, descending into IO structs.
fn collect_locations(
    module: &naga::Module,
    name: Option<&String>,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
    out: &mut Vec<InterfaceVar>,
) {
    match binding {
        Some(naga::Binding::Location { location, .. }) => out.push(InterfaceVar {
            name: name.cloned(),
            location: *location,
            ty,
        }),
        Some(naga::Binding::BuiltIn(_)) => {}
        None => {
            if let naga::TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for m in members {
                    collect_locations(module, m.name.as_ref(), m.ty, m.binding.as_ref(), out);
                }
            }
        }
    }
}

fn float_components(module: &naga::Module, ty: naga::Handle<naga::Type>) -> Option<u32> {
    match module.types[ty].inner {
        naga::TypeInner::Scalar(naga::Scalar::F32) => Some(1),
        naga::TypeInner::Vector { size, scalar: naga::Scalar::F32 } => Some(size as u32),
        _ => None,
    }
}

fn stage_uniforms(module: &naga::Module) -> Vec<(String, UniformSlot)> {
    module
        .global_variables
        .iter()
        .filter(|(_, var)| var.space == naga::AddressSpace::Uniform)
        .filter_map(|(_, var)| {
            let name = var.name.clone()?;
            let rb = var.binding.as_ref()?;
            let size = module.types[var.ty].inner.size(module.to_ctx()) as u64;
            Some((
                name,
                UniformSlot {
                    group: rb.group,
                    binding: rb.binding,
                    size,
                },
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SWAPPED_VERTEX: &str = r#"
@group(0) @binding(0) var<uniform> u_mvp: mat4x4<f32>;

struct Out {
    @builtin(position) pos: vec4<f32>,
    @location(0) color: vec4<f32>,
};

@vertex
fn vs_main(@location(1) a_position: vec3<f32>, @location(0) a_color: vec4<f32>) -> Out {
    var o: Out;
    o.pos = u_mvp * vec4<f32>(a_position, 1.0);
    o.color = a_color;
    return o;
}
"#;

    const READS_LOCATION_3: &str = r#"
@fragment
fn fs_main(@location(3) v: vec4<f32>) -> @location(0) vec4<f32> {
    return v;
}
"#;

    const OTHER_UNIFORM_AT_ZERO: &str = r#"
@group(0) @binding(0) var<uniform> u_tint: vec4<f32>;

@fragment
fn fs_main(@location(0) v: vec4<f32>) -> @location(0) vec4<f32> {
    return v * u_tint;
}
"#;

    const INTEGER_POSITION_VERTEX: &str = r#"
@group(0) @binding(0) var<uniform> u_mvp: mat4x4<f32>;

struct Out {
    @builtin(position) pos: vec4<f32>,
    @location(0) color: vec4<f32>,
};

@vertex
fn vs_main(@location(0) a_position: vec3<i32>, @location(1) a_color: vec4<f32>) -> Out {
    var o: Out;
    o.pos = u_mvp * vec4<f32>(vec3<f32>(a_position), 1.0);
    o.color = a_color;
    return o;
}
"#;

    fn flat_program() -> ShaderProgram {
        ShaderProgram::from_sources(&ShaderSources::flat(), &AttributeBindings::standard())
            .expect("built-in shaders link")
    }

    #[test]
    fn flat_pair_links_with_fixed_locations() {
        let program = flat_program();

        assert_ne!(program.id().get(), 0);
        assert_eq!(program.attribute_location(POSITION_ATTRIBUTE), Some(0));
        assert_eq!(program.attribute_location(COLOR_ATTRIBUTE), Some(1));
    }

    #[test]
    fn flat_pair_uniform_slots() {
        let program = flat_program();

        let mvp = program.uniform_location(MVP_UNIFORM).unwrap();
        assert_eq!((mvp.group, mvp.binding, mvp.size), (0, 0, 64));

        let color = program.uniform_location(COLOR_UNIFORM).unwrap();
        assert_eq!((color.group, color.binding, color.size), (0, 1, 16));

        let info = program.uniforms().iter().find(|u| u.name == MVP_UNIFORM).unwrap();
        assert!(info.vertex && !info.fragment);
    }

    #[test]
    fn flat_pair_attribute_widths() {
        let program = flat_program();
        let width = |name: &str| {
            program
                .attributes()
                .iter()
                .find(|a| a.name == name)
                .and_then(|a| a.float_components)
        };
        assert_eq!(width(POSITION_ATTRIBUTE), Some(3));
        assert_eq!(width(COLOR_ATTRIBUTE), Some(4));
    }

    #[test]
    fn integer_attribute_fails_to_link() {
        let sources = ShaderSources::new(INTEGER_POSITION_VERTEX, ShaderSources::flat().fragment);
        let err = ShaderProgram::from_sources(&sources, &AttributeBindings::standard()).unwrap_err();
        assert!(matches!(err, ShaderError::Link { .. }));
    }

    #[test]
    fn program_ids_are_unique() {
        assert_ne!(flat_program().id(), flat_program().id());
    }

    #[test]
    fn syntax_error_is_a_compilation_error() {
        let err = compile(Stage::Vertex, "fn vs_main( {").unwrap_err();
        assert!(matches!(err, ShaderError::Compilation { stage: Stage::Vertex, .. }));
    }

    #[test]
    fn type_error_is_a_compilation_error() {
        let src = "@fragment fn fs_main() -> @location(0) vec4<f32> { return 1.0; }";
        let err = compile(Stage::Fragment, src).unwrap_err();
        assert!(matches!(err, ShaderError::Compilation { stage: Stage::Fragment, .. }));
    }

    #[test]
    fn missing_entry_point_is_a_compilation_error() {
        let err = compile(Stage::Vertex, READS_LOCATION_3).unwrap_err();
        match err {
            ShaderError::Compilation { stage, message } => {
                assert_eq!(stage, Stage::Vertex);
                assert!(message.contains("entry point"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn invalid_vertex_source_fails_before_fragment() {
        let sources = ShaderSources::new("not wgsl", "also not wgsl");
        let err = ShaderProgram::from_sources(&sources, &AttributeBindings::standard()).unwrap_err();
        assert!(matches!(err, ShaderError::Compilation { stage: Stage::Vertex, .. }));
    }

    #[test]
    fn declared_location_must_match_binding() {
        let sources = ShaderSources::new(SWAPPED_VERTEX, ShaderSources::flat().fragment);
        let err = ShaderProgram::from_sources(&sources, &AttributeBindings::standard()).unwrap_err();
        assert!(matches!(err, ShaderError::Link { .. }));

        // Binding to the declared locations links fine.
        let bindings = AttributeBindings::empty()
            .bind(POSITION_ATTRIBUTE, 1)
            .bind(COLOR_ATTRIBUTE, 0);
        let program = ShaderProgram::from_sources(&sources, &bindings).unwrap();
        assert_eq!(program.attribute_location(POSITION_ATTRIBUTE), Some(1));
    }

    #[test]
    fn unknown_bound_attribute_fails_to_link() {
        let bindings = AttributeBindings::standard().bind("a_normal", 2);
        let err = ShaderProgram::from_sources(&ShaderSources::flat(), &bindings).unwrap_err();
        assert!(matches!(err, ShaderError::Link { .. }));
    }

    #[test]
    fn duplicate_location_fails_to_link() {
        let bindings = AttributeBindings::empty()
            .bind(POSITION_ATTRIBUTE, 0)
            .bind(COLOR_ATTRIBUTE, 0);
        let err = ShaderProgram::from_sources(&ShaderSources::flat(), &bindings).unwrap_err();
        assert!(matches!(err, ShaderError::Link { .. }));
    }

    #[test]
    fn unwritten_fragment_input_fails_to_link() {
        let sources = ShaderSources::new(ShaderSources::flat().vertex, READS_LOCATION_3);
        let err = ShaderProgram::from_sources(&sources, &AttributeBindings::standard()).unwrap_err();
        assert!(matches!(err, ShaderError::Link { .. }));
    }

    #[test]
    fn conflicting_uniform_slots_fail_to_link() {
        let sources = ShaderSources::new(ShaderSources::flat().vertex, OTHER_UNIFORM_AT_ZERO);
        let err = ShaderProgram::from_sources(&sources, &AttributeBindings::standard()).unwrap_err();
        assert!(matches!(err, ShaderError::Link { .. }));
    }

    #[test]
    fn stages_must_be_in_order() {
        let sources = ShaderSources::flat();
        let vs = compile(Stage::Vertex, &sources.vertex).unwrap();
        let fs = compile(Stage::Fragment, &sources.fragment).unwrap();

        let err = link(fs, vs, &AttributeBindings::standard()).unwrap_err();
        assert!(matches!(err, ShaderError::Link { .. }));
    }

    #[test]
    fn rebinding_replaces_previous_location() {
        let bindings = AttributeBindings::standard().bind(POSITION_ATTRIBUTE, 4);
        let collected: Vec<_> = bindings.iter().collect();
        assert_eq!(collected, vec![(COLOR_ATTRIBUTE, 1), (POSITION_ATTRIBUTE, 4)]);
    }
}
