//! Vertex upload into the fixed-capacity arena
//!
//! Meshes are flattened in list order into the start of the arena. The
//! resulting vertex count becomes the draw count for the next recorded frame.
//! Oversized uploads are rejected before the arena is mapped, so the previous
//! geometry and draw count stay intact.

use ash::vk;

use super::backend::ArenaMemory;
use super::error::{VulkanError, VulkanResult};
use super::vertex::Mesh;

/// Total vertices across `meshes`
pub fn total_vertices(meshes: &[Mesh]) -> usize {
    meshes.iter().map(Mesh::len).sum()
}

/// Single writer of the vertex arena
#[derive(Debug)]
pub struct VertexUploadChannel<M: ArenaMemory> {
    arena: M,
    vertex_count: u32,
}

impl<M: ArenaMemory> VertexUploadChannel<M> {
    /// Wrap an arena; nothing is drawn until the first upload
    pub fn new(arena: M) -> Self {
        Self { arena, vertex_count: 0 }
    }

    /// Arena capacity in vertices
    pub fn capacity(&self) -> usize {
        self.arena.capacity()
    }

    /// Vertices written by the last successful upload
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Buffer to bind for drawing
    pub fn buffer(&self) -> vk::Buffer {
        self.arena.buffer()
    }

    /// Underlying arena
    pub fn arena(&self) -> &M {
        &self.arena
    }

    /// Copy `meshes` contiguously into the arena
    ///
    /// Not synchronized against GPU reads; the caller must make sure no
    /// in-flight frame is still drawing from the arena.
    pub fn upload(&mut self, meshes: &[Mesh]) -> VulkanResult<u32> {
        let total = total_vertices(meshes);
        let capacity = self.arena.capacity();
        if total > capacity {
            return Err(VulkanError::CapacityExceeded {
                requested: total,
                capacity,
            });
        }
        let count = u32::try_from(total).map_err(|_| VulkanError::CapacityExceeded {
            requested: total,
            capacity,
        })?;

        self.arena.with_mapped(|mapped| {
            let mut offset = 0;
            for mesh in meshes {
                let end = offset + mesh.len();
                mapped[offset..end].copy_from_slice(&mesh.vertices);
                offset = end;
            }
        })?;

        self.vertex_count = count;
        log::trace!("Uploaded {} vertices from {} meshes", count, meshes.len());
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::tests::mock_gpu::MockArena;
    use crate::render::vertex::Vertex;

    fn mesh(start: f32, count: usize) -> Mesh {
        Mesh::new(
            (0..count)
                .map(|i| Vertex::new([start + i as f32, 0.0], [1.0, 0.0, 0.0]))
                .collect(),
        )
    }

    #[test]
    fn test_upload_concatenates_in_order() {
        let mut channel = VertexUploadChannel::new(MockArena::new(16));
        let meshes = [mesh(0.0, 3), mesh(100.0, 2), mesh(200.0, 4)];

        let count = channel.upload(&meshes).unwrap();
        assert_eq!(count, 9);
        assert_eq!(channel.vertex_count(), 9);

        let expected: Vec<Vertex> = meshes.iter().flat_map(|m| m.vertices.clone()).collect();
        assert_eq!(&channel.arena().contents()[..9], expected.as_slice());
    }

    #[test]
    fn test_upload_exact_capacity() {
        let mut channel = VertexUploadChannel::new(MockArena::new(6));
        assert_eq!(channel.upload(&[mesh(0.0, 3), mesh(10.0, 3)]).unwrap(), 6);
    }

    /// Rejected uploads never map the arena or touch the draw count
    #[test]
    fn test_upload_over_capacity_leaves_arena_untouched() {
        let mut channel = VertexUploadChannel::new(MockArena::new(4));
        channel.upload(&[mesh(0.0, 3)]).unwrap();
        let before = channel.arena().contents().to_vec();
        let maps_before = channel.arena().map_count();

        let result = channel.upload(&[mesh(50.0, 3), mesh(60.0, 2)]);
        assert_eq!(result, Err(VulkanError::CapacityExceeded { requested: 5, capacity: 4 }));
        assert_eq!(channel.arena().contents(), before.as_slice());
        assert_eq!(channel.arena().map_count(), maps_before);
        assert_eq!(channel.vertex_count(), 3);
    }

    #[test]
    fn test_map_unmap_balanced() {
        let mut channel = VertexUploadChannel::new(MockArena::new(8));
        channel.upload(&[mesh(0.0, 2)]).unwrap();
        channel.upload(&[]).unwrap();
        assert_eq!(channel.arena().map_count(), 2);
        assert!(!channel.arena().is_mapped());
        assert_eq!(channel.vertex_count(), 0);
    }

    #[test]
    fn test_map_failure_keeps_count() {
        let mut channel = VertexUploadChannel::new(MockArena::new(8));
        channel.upload(&[mesh(0.0, 2)]).unwrap();
        channel.arena_mut_for_test().fail_next_map = true;
        assert!(channel.upload(&[mesh(0.0, 5)]).is_err());
        assert_eq!(channel.vertex_count(), 2);
    }

    impl<M: ArenaMemory> VertexUploadChannel<M> {
        fn arena_mut_for_test(&mut self) -> &mut M {
            &mut self.arena
        }
    }
}
