//! Device buffers for meshes and uniforms.

use crate::mesh::MeshData;
use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

/// Interleaved sphere vertex: position, normal, equirectangular uv.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct VertexPositionNormalUv {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl VertexPositionNormalUv {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Vertex and `u32` index buffers of one tessellated geometry.
pub struct MeshBuffer {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
}

impl MeshBuffer {
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.index_count, 0, 0..1);
    }
}

/// Creates initialised buffers on one device.
pub struct BufferAllocator<'a> {
    device: &'a wgpu::Device,
}

impl<'a> BufferAllocator<'a> {
    pub fn new(device: &'a wgpu::Device) -> Self {
        Self { device }
    }

    fn init(&self, label: &str, contents: &[u8], usage: wgpu::BufferUsages) -> wgpu::Buffer {
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage,
            })
    }

    pub fn create_mesh(&self, label: &str, mesh: &MeshData) -> MeshBuffer {
        MeshBuffer {
            vertex_buffer: self.init(
                &format!("{label}-vertices"),
                bytemuck::cast_slice(&mesh.vertices),
                wgpu::BufferUsages::VERTEX,
            ),
            index_buffer: self.init(
                &format!("{label}-indices"),
                bytemuck::cast_slice(&mesh.indices),
                wgpu::BufferUsages::INDEX,
            ),
            index_count: mesh.indices.len() as u32,
        }
    }

    /// Uniform holding `value`; later updates go through `Queue::write_buffer`.
    pub fn create_uniform<T: Pod>(&self, label: &str, value: &T) -> wgpu::Buffer {
        self.init(
            label,
            bytemuck::bytes_of(value),
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::uv_sphere;
    use crate::test_util::create_test_device;

    #[test]
    fn test_vertex_layout_is_tightly_packed() {
        let layout = VertexPositionNormalUv::layout();
        assert_eq!(layout.array_stride, 32);
        let offsets: Vec<u64> = layout.attributes.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 24]);
        assert_eq!(layout.attributes[2].shader_location, 2);
    }

    #[test]
    fn test_mesh_upload_keeps_index_count() {
        let Some((device, _queue)) = create_test_device() else {
            return;
        };
        let mesh = uv_sphere(1.0, 8, 6);
        let buffer = BufferAllocator::new(&device).create_mesh("sphere", &mesh);
        assert_eq!(buffer.index_count as usize, mesh.indices.len());
        assert_eq!(
            buffer.vertex_buffer.size() as usize,
            mesh.vertices.len() * std::mem::size_of::<VertexPositionNormalUv>()
        );
    }

    #[test]
    fn test_uniform_buffer_size() {
        let Some((device, _queue)) = create_test_device() else {
            return;
        };
        let value = [0.0_f32; 16];
        let buffer = BufferAllocator::new(&device).create_uniform("u", &value);
        assert_eq!(buffer.size(), 64);
        assert!(buffer.usage().contains(wgpu::BufferUsages::COPY_DST));
    }
}
