use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex {
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3],
    };
}

/// CPU mesh shared by every instance of a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u16>,
}

impl MeshData {
    /// Unit cube (half-size 0.5) with per-face normals.
    pub fn cube() -> Self {
        let p = 0.5_f32;
        #[rustfmt::skip]
        let vertices = vec![
            // +Z face
            Vertex { position: [-p, -p,  p], normal: [0.0, 0.0, 1.0] },
            Vertex { position: [ p, -p,  p], normal: [0.0, 0.0, 1.0] },
            Vertex { position: [ p,  p,  p], normal: [0.0, 0.0, 1.0] },
            Vertex { position: [-p,  p,  p], normal: [0.0, 0.0, 1.0] },
            // -Z face
            Vertex { position: [ p, -p, -p], normal: [0.0, 0.0, -1.0] },
            Vertex { position: [-p, -p, -p], normal: [0.0, 0.0, -1.0] },
            Vertex { position: [-p,  p, -p], normal: [0.0, 0.0, -1.0] },
            Vertex { position: [ p,  p, -p], normal: [0.0, 0.0, -1.0] },
            // +X face
            Vertex { position: [ p, -p,  p], normal: [1.0, 0.0, 0.0] },
            Vertex { position: [ p, -p, -p], normal: [1.0, 0.0, 0.0] },
            Vertex { position: [ p,  p, -p], normal: [1.0, 0.0, 0.0] },
            Vertex { position: [ p,  p,  p], normal: [1.0, 0.0, 0.0] },
            // -X face
            Vertex { position: [-p, -p, -p], normal: [-1.0, 0.0, 0.0] },
            Vertex { position: [-p, -p,  p], normal: [-1.0, 0.0, 0.0] },
            Vertex { position: [-p,  p,  p], normal: [-1.0, 0.0, 0.0] },
            Vertex { position: [-p,  p, -p], normal: [-1.0, 0.0, 0.0] },
            // +Y face
            Vertex { position: [-p,  p,  p], normal: [0.0, 1.0, 0.0] },
            Vertex { position: [ p,  p,  p], normal: [0.0, 1.0, 0.0] },
            Vertex { position: [ p,  p, -p], normal: [0.0, 1.0, 0.0] },
            Vertex { position: [-p,  p, -p], normal: [0.0, 1.0, 0.0] },
            // -Y face
            Vertex { position: [-p, -p, -p], normal: [0.0, -1.0, 0.0] },
            Vertex { position: [ p, -p, -p], normal: [0.0, -1.0, 0.0] },
            Vertex { position: [ p, -p,  p], normal: [0.0, -1.0, 0.0] },
            Vertex { position: [-p, -p,  p], normal: [0.0, -1.0, 0.0] },
        ];
        #[rustfmt::skip]
        let indices: Vec<u16> = vec![
            0,1,2, 2,3,0,       // +Z
            4,5,6, 6,7,4,       // -Z
            8,9,10, 10,11,8,    // +X
            12,13,14, 14,15,12, // -X
            16,17,18, 18,19,16, // +Y
            20,21,22, 22,23,20, // -Y
        ];
        Self { vertices, indices }
    }

    /// Octahedron with flat-shaded faces, used for projectiles.
    pub fn octahedron(radius: f32) -> Self {
        let tips = [
            Vec3::X,
            Vec3::NEG_X,
            Vec3::Y,
            Vec3::NEG_Y,
            Vec3::Z,
            Vec3::NEG_Z,
        ]
        .map(|v| v * radius);
        // Counter-clockwise seen from outside.
        #[rustfmt::skip]
        let faces = [
            (0, 2, 4), (4, 2, 1), (1, 2, 5), (5, 2, 0),
            (4, 3, 0), (1, 3, 4), (5, 3, 1), (0, 3, 5),
        ];
        let mut vertices = Vec::with_capacity(faces.len() * 3);
        let mut indices = Vec::with_capacity(faces.len() * 3);
        for (a, b, c) in faces {
            let (a, b, c) = (tips[a], tips[b], tips[c]);
            let normal = (b - a).cross(c - a).normalize_or_zero().to_array();
            for p in [a, b, c] {
                indices.push(vertices.len() as u16);
                vertices.push(Vertex {
                    position: p.to_array(),
                    normal,
                });
            }
        }
        Self { vertices, indices }
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Length of the half-extent of the axis-aligned bounds. Zero for an
    /// empty mesh.
    pub fn bound_radius(&self) -> f32 {
        let mut iter = self.vertices.iter().map(|v| Vec3::from_array(v.position));
        let Some(first) = iter.next() else {
            return 0.0;
        };
        let (min, max) = iter.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));
        ((max - min) * 0.5).length()
    }
}

/// A mesh uploaded to the device.
#[derive(Debug)]
pub struct GpuMesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
    pub bound_radius: f32,
}

impl GpuMesh {
    pub fn upload(device: &wgpu::Device, label: &str, mesh: &MeshData) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}_vertex_buffer")),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        // Index buffers must be a multiple of 4 bytes.
        let mut indices = mesh.indices.clone();
        if indices.len() % 2 == 1 {
            indices.push(0);
        }
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}_index_buffer")),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex_buffer,
            index_buffer,
            index_count: mesh.index_count(),
            bound_radius: mesh.bound_radius(),
        }
    }
}
