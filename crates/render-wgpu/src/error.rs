/// Errors that abort render startup.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("no culling kernel was provided")]
    MissingCullKernel,
    #[error("no stream has a mesh; nothing can be drawn")]
    NoRenderableStreams,
    #[error("shader `{label}` failed to compile: {message}")]
    ShaderCompile { label: &'static str, message: String },
}
