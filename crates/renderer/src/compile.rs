use crate::gl::{GlApi, ShaderStage};

/// Vertex stage shared by every effect: places the unit quad with `proj`.
pub const VERTEX_SHADER: &str = include_str!("../shaders/vertex.glsl");

/// Declarations and helpers prepended to every effect's fragment source.
pub const COMMON_PREAMBLE: &str = include_str!("../shaders/common.glsl");

/// Failure to produce a linked program. Every variant carries the driver log.
#[derive(Debug, thiserror::Error)]
pub enum ProgramError {
    #[error("failed to create GL object: {0}")]
    Create(String),
    #[error("vertex shader failed to compile: {0}")]
    VertexCompile(String),
    #[error("fragment shader failed to compile: {0}")]
    FragmentCompile(String),
    #[error("program failed to link: {0}")]
    Link(String),
}

/// Produces a self-contained GLSL ES fragment shader from an effect body.
///
/// Steps performed:
///
/// 1. Strip `#version` directives and default `precision` statements, which
///    the preamble already provides and which must not appear twice.
/// 2. Prepend [`COMMON_PREAMBLE`].
/// 3. Insert `#line 1` so driver logs point at lines of the effect body.
pub fn wrap_fragment(source: &str) -> String {
    let mut sanitized = String::with_capacity(source.len());
    for line in source.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("#version") || is_default_precision(trimmed) {
            // Keep the line count stable for `#line`.
            sanitized.push('\n');
            continue;
        }
        sanitized.push_str(line);
        sanitized.push('\n');
    }

    let preamble = COMMON_PREAMBLE.trim_end();
    format!("{preamble}\n#line 1\n{sanitized}")
}

fn is_default_precision(line: &str) -> bool {
    let mut words = line.split_whitespace();
    words.next() == Some("precision")
        && matches!(words.next(), Some("lowp" | "mediump" | "highp"))
        && words.next().is_some_and(|ty| ty.trim_end_matches(';') == "float")
}

/// Compiles and links `vertex` and `fragment` into a program.
///
/// Shaders are detached and deleted once linking finishes, whatever the
/// outcome; on failure the program is deleted as well, so an `Err` leaves no
/// GL objects behind.
pub fn compile_program<G: GlApi + ?Sized>(
    gl: &G,
    vertex: &str,
    fragment: &str,
) -> Result<u32, ProgramError> {
    let program = gl.create_program().map_err(ProgramError::Create)?;

    let mut shaders = Vec::with_capacity(2);
    for (stage, source) in [(ShaderStage::Vertex, vertex), (ShaderStage::Fragment, fragment)] {
        match compile_shader(gl, stage, source) {
            Ok(shader) => {
                gl.attach_shader(program, shader);
                shaders.push(shader);
            }
            Err(err) => {
                release(gl, program, &shaders);
                gl.delete_program(program);
                return Err(err);
            }
        }
    }

    gl.link_program(program);
    let linked = gl.program_link_status(program);
    let log = if linked {
        String::new()
    } else {
        gl.program_info_log(program)
    };
    release(gl, program, &shaders);

    if !linked {
        gl.delete_program(program);
        return Err(ProgramError::Link(log));
    }
    Ok(program)
}

fn compile_shader<G: GlApi + ?Sized>(
    gl: &G,
    stage: ShaderStage,
    source: &str,
) -> Result<u32, ProgramError> {
    let shader = gl.create_shader(stage).map_err(ProgramError::Create)?;
    gl.shader_source(shader, source);
    gl.compile_shader(shader);
    if gl.shader_compile_status(shader) {
        return Ok(shader);
    }

    let log = gl.shader_info_log(shader);
    gl.delete_shader(shader);
    Err(match stage {
        ShaderStage::Vertex => ProgramError::VertexCompile(log),
        ShaderStage::Fragment => ProgramError::FragmentCompile(log),
    })
}

fn release<G: GlApi + ?Sized>(gl: &G, program: u32, shaders: &[u32]) {
    for &shader in shaders {
        gl.detach_shader(program, shader);
        gl.delete_shader(shader);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingGl;

    #[test]
    fn wrap_strips_version_and_precision() {
        let source = r#"
            #version 300 es
            precision highp float;
            uniform float uNoise;
            void main() { setOutputColor(vec4(uNoise)); }
        "#;

        let wrapped = wrap_fragment(source);
        assert!(wrapped.starts_with("#version 300 es"));
        assert_eq!(wrapped.matches("#version").count(), 1);
        assert!(!wrapped.contains("precision highp float"));
        assert!(wrapped.contains("uniform float uNoise;"));
        assert!(wrapped.contains("getInputColor"));
    }

    #[test]
    fn line_directive_precedes_effect_body() {
        let wrapped = wrap_fragment("void main() {}\n");
        let (head, body) = wrapped.split_once("#line 1\n").unwrap();
        assert!(head.contains("uniform float uProgress;"));
        assert_eq!(body, "void main() {}\n");
    }

    #[test]
    fn keeps_non_default_precision_statements() {
        let wrapped = wrap_fragment("precision mediump sampler3D;\n");
        assert!(wrapped.contains("precision mediump sampler3D;"));
    }

    #[test]
    fn successful_compile_leaves_only_the_program() {
        let gl = RecordingGl::new();
        let program = compile_program(&gl, VERTEX_SHADER, &wrap_fragment("void main() {}")).unwrap();
        assert_ne!(program, 0);
        assert_eq!(gl.live_shaders(), 0);
        assert_eq!(gl.live_programs(), 1);
    }

    #[test]
    fn fragment_failure_cleans_up_and_reports_log() {
        let gl = RecordingGl::new();
        gl.fail_compile_containing("BROKEN");
        let err = compile_program(&gl, VERTEX_SHADER, "BROKEN").unwrap_err();
        assert!(matches!(err, ProgramError::FragmentCompile(ref log) if log.contains("BROKEN")));
        assert_eq!(gl.live_shaders(), 0);
        assert_eq!(gl.live_programs(), 0);
    }

    #[test]
    fn link_failure_deletes_program() {
        let gl = RecordingGl::new();
        gl.fail_link_containing("UNLINKABLE");
        let err = compile_program(&gl, VERTEX_SHADER, "// UNLINKABLE").unwrap_err();
        assert!(matches!(err, ProgramError::Link(_)));
        assert_eq!(gl.live_objects(), 0);
    }
}
