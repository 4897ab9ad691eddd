//! wgpu rendering for the orrery scene: surface management, mesh and texture
//! upload, the lit/unlit/shadow pipelines, bloom, and the two-pass layered
//! compositor.

pub mod basic_pipeline;
pub mod bloom;
pub mod buffer;
pub mod compositor;
pub mod depth;
pub mod gpu;
pub mod mesh;
pub mod pass;
pub mod phong_pipeline;
pub mod pipeline;
pub mod scene_renderer;
pub mod shadow_pipeline;
pub mod texture;

#[cfg(test)]
mod test_util;

pub use bloom::{BloomPipeline, HDR_FORMAT};
pub use buffer::{BufferAllocator, MeshBuffer, VertexPositionNormalUv};
pub use compositor::{BloomCompositor, BloomSettings, RenderError, RenderTarget, SceneRenderer};
pub use depth::DepthBuffer;
pub use gpu::{RenderContext, RenderContextError, SurfaceError, init_render_context_blocking};
pub use mesh::{MeshData, icosphere, tessellate, uv_sphere};
pub use pass::{FrameEncoder, RenderPassBuilder, SPACE_BLACK};
pub use scene_renderer::WgpuSceneRenderer;
pub use texture::{ManagedTexture, TextureAssets, TextureError, TextureManager, TextureUpload};
