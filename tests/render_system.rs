//! Frame recording tests for the render system.
//!
//! Every test drives the recording [`DummyBackend`] and inspects the command
//! stream it captured.
//!
//! ```bash
//! cargo test --test render_system
//! ```

mod common;

use rstest::rstest;

use common::{
    bind_groups_at, count, is_indexed_draw, pass_commands, setup, uniform_floats, HEIGHT, WIDTH,
};
use render_system::backend::dummy::Command;
use render_system::backend::BackendError;
use render_system::prelude::*;

const GEOMETRY: &str = "Geometry Pass";
const LIGHT: &str = "Light Pass";
const COMPOSITE: &str = "Composite Pass";

fn cube_entities(system: &mut RenderSystem, entities: &[u32]) -> MeshId {
    let mesh = system.add_mesh(Mesh::new("cube", MeshData::cube()));
    for &e in entities {
        system
            .create(EntityId(e), RenderComponent::new(mesh))
            .unwrap();
    }
    mesh
}

// ============================================================================
// Frame Structure Tests
// ============================================================================

#[test]
fn frame_records_three_passes_in_order() {
    let (mut backend, mut system) = setup();
    cube_entities(&mut system, &[1]);

    system
        .render(&mut backend, &TransformMap::new(), &Camera::default())
        .unwrap();

    assert_eq!(backend.pass_labels(), vec![GEOMETRY, LIGHT, COMPOSITE]);
    assert_eq!(backend.frames(), 1);
    assert!(!backend.in_frame());
    assert_eq!(backend.commands().first(), Some(&Command::BeginFrame));
    assert_eq!(backend.commands().last(), Some(&Command::EndFrame));
}

#[test]
fn empty_table_still_composites() {
    let (mut backend, mut system) = setup();

    system
        .render(&mut backend, &TransformMap::new(), &Camera::default())
        .unwrap();

    assert_eq!(backend.pass_labels(), vec![GEOMETRY, LIGHT, COMPOSITE]);
    assert_eq!(count(&pass_commands(&backend, GEOMETRY), is_indexed_draw), 0);
    let composite = pass_commands(&backend, COMPOSITE);
    assert_eq!(
        count(&composite, |c| matches!(c, Command::Draw { .. })),
        1
    );
}

#[test]
fn every_pass_uses_framebuffer_viewport() {
    let (mut backend, mut system) = setup();

    system
        .render(&mut backend, &TransformMap::new(), &Camera::default())
        .unwrap();

    for label in [GEOMETRY, LIGHT, COMPOSITE] {
        let commands = pass_commands(&backend, label);
        assert!(
            commands.contains(&Command::SetViewport {
                width: WIDTH as f32,
                height: HEIGHT as f32,
            }),
            "{} has no full-size viewport",
            label
        );
    }
}

#[test]
fn render_before_resize_fails() {
    common::init_logging();
    let mut backend = DummyBackend::new();
    let mut system = RenderSystem::new(&mut backend, RenderConfig::default()).unwrap();

    let result = system.render(&mut backend, &TransformMap::new(), &Camera::default());

    assert!(matches!(result, Err(RenderError::TargetsNotSized)));
    assert!(backend.pass_labels().is_empty());
    assert_eq!(backend.frames(), 0);
}

// ============================================================================
// Resize Tests
// ============================================================================

#[rstest]
#[case::zero_width(0, 10)]
#[case::zero_height(10, 0)]
#[case::both_zero(0, 0)]
fn resize_rejects_empty_framebuffer(#[case] width: u32, #[case] height: u32) {
    let (mut backend, mut system) = setup();

    let result = system.resize(&mut backend, width, height);

    assert!(matches!(
        result,
        Err(RenderError::InvalidFramebufferSize { .. })
    ));
    assert_eq!(system.framebuffer_size(), Some((WIDTH, HEIGHT)));
}

#[test]
fn resize_to_same_size_keeps_targets() {
    let (mut backend, mut system) = setup();
    let output = system.output();
    let textures = backend.live_textures();

    system.resize(&mut backend, WIDTH, HEIGHT).unwrap();

    assert_eq!(system.output(), output);
    assert_eq!(backend.live_textures(), textures);
}

#[test]
fn resize_replaces_targets() {
    let (mut backend, mut system) = setup();
    let output = system.output();
    let textures = backend.live_textures();
    let views = backend.live_texture_views();

    system.resize(&mut backend, 128, 96).unwrap();

    assert_eq!(system.framebuffer_size(), Some((128, 96)));
    assert_ne!(system.output(), output);
    assert_eq!(backend.live_textures(), textures);
    assert_eq!(backend.live_texture_views(), views);

    let out = system.output().unwrap();
    let desc = backend.texture(out.texture).unwrap();
    assert_eq!((desc.width, desc.height), (128, 96));
}

#[test]
fn failed_target_creation_keeps_old_targets() {
    let (mut backend, mut system) = setup();
    let output = system.output();
    let textures = backend.live_textures();
    let views = backend.live_texture_views();

    backend.fail_textures_after(3);
    let result = system.resize(&mut backend, 128, 96);

    assert!(matches!(
        result,
        Err(RenderError::Backend(BackendError::TextureCreationFailed(_)))
    ));
    assert_eq!(system.framebuffer_size(), Some((WIDTH, HEIGHT)));
    assert_eq!(system.output(), output);
    assert_eq!(backend.live_textures(), textures);
    assert_eq!(backend.live_texture_views(), views);
}

#[test]
fn failed_target_binding_releases_everything() {
    let (mut backend, mut system) = setup();
    let textures = backend.live_textures();
    let views = backend.live_texture_views();
    let bind_groups = backend.live_bind_groups();

    // The light pass binds, the composite pass fails
    backend.fail_bind_groups_after(1);
    let result = system.resize(&mut backend, 128, 96);

    assert!(matches!(
        result,
        Err(RenderError::Backend(BackendError::PipelineCreationFailed(_)))
    ));
    assert_eq!(system.framebuffer_size(), None);
    // Old and new targets are gone, and so are both target bind groups
    assert_eq!(backend.live_textures(), textures - 5);
    assert_eq!(backend.live_texture_views(), views - 5);
    assert_eq!(backend.live_bind_groups(), bind_groups - 2);

    let frame = system.render(&mut backend, &TransformMap::new(), &Camera::default());
    assert!(matches!(frame, Err(RenderError::TargetsNotSized)));

    backend.clear_failures();
    system.resize(&mut backend, 128, 96).unwrap();
    assert_eq!(backend.live_textures(), textures);
    assert_eq!(backend.live_texture_views(), views);
    assert_eq!(backend.live_bind_groups(), bind_groups);
}

// ============================================================================
// Geometry Pass Tests
// ============================================================================

#[test]
fn one_draw_per_record() {
    let (mut backend, mut system) = setup();
    cube_entities(&mut system, &[1, 2, 3]);

    system
        .render(&mut backend, &TransformMap::new(), &Camera::default())
        .unwrap();

    let geometry = pass_commands(&backend, GEOMETRY);
    assert_eq!(count(&geometry, is_indexed_draw), 3);
    // One topology, one pipeline switch
    assert_eq!(
        count(&geometry, |c| matches!(c, Command::SetPipeline(_))),
        1
    );
}

#[test]
fn shared_texture_is_bound_once() {
    let (mut backend, mut system) = setup();
    let mesh = system.add_mesh(Mesh::new("quad", MeshData::quad()));
    let texture = system
        .add_texture(&mut backend, &TextureData::solid_color([255, 0, 0, 255], "red"))
        .unwrap();
    for e in 1..=4 {
        system
            .create(EntityId(e), RenderComponent::new(mesh).with_texture(texture))
            .unwrap();
    }

    system
        .render(&mut backend, &TransformMap::new(), &Camera::default())
        .unwrap();

    let geometry = pass_commands(&backend, GEOMETRY);
    assert_eq!(count(&geometry, is_indexed_draw), 4);
    assert_eq!(
        bind_groups_at(&geometry, 2),
        vec![system.texture(texture).unwrap().bind_group()]
    );
}

#[test]
fn alternating_textures_rebind_each_change() {
    let (mut backend, mut system) = setup();
    let mesh = system.add_mesh(Mesh::new("quad", MeshData::quad()));
    let red = system
        .add_texture(&mut backend, &TextureData::solid_color([255, 0, 0, 255], "red"))
        .unwrap();
    let blue = system
        .add_texture(&mut backend, &TextureData::solid_color([0, 0, 255, 255], "blue"))
        .unwrap();
    for (e, texture) in [(1, red), (2, red), (3, blue), (4, red)] {
        system
            .create(EntityId(e), RenderComponent::new(mesh).with_texture(texture))
            .unwrap();
    }

    system
        .render(&mut backend, &TransformMap::new(), &Camera::default())
        .unwrap();

    let red_group = system.texture(red).unwrap().bind_group();
    let blue_group = system.texture(blue).unwrap().bind_group();
    assert_eq!(
        bind_groups_at(&pass_commands(&backend, GEOMETRY), 2),
        vec![red_group, blue_group, red_group]
    );
}

#[test]
fn removed_mesh_is_skipped() {
    let (mut backend, mut system) = setup();
    let cube = cube_entities(&mut system, &[1]);
    let quad = system.add_mesh(Mesh::new("quad", MeshData::quad()));
    system
        .create(EntityId(2), RenderComponent::new(quad))
        .unwrap();

    system
        .render(&mut backend, &TransformMap::new(), &Camera::default())
        .unwrap();
    assert_eq!(count(&pass_commands(&backend, GEOMETRY), is_indexed_draw), 2);

    assert!(system.remove_mesh(&mut backend, cube).is_some());
    assert!(system.mesh(cube).is_none());
    backend.clear_commands();

    system
        .render(&mut backend, &TransformMap::new(), &Camera::default())
        .unwrap();
    let geometry = pass_commands(&backend, GEOMETRY);
    assert_eq!(count(&geometry, is_indexed_draw), 1);
    // The surviving record still gets its own object slot
    assert_eq!(bind_groups_at(&geometry, 1).len(), 1);
}

#[test]
fn removed_texture_falls_back_to_white() {
    let (mut backend, mut system) = setup();
    let mesh = system.add_mesh(Mesh::new("quad", MeshData::quad()));
    let texture = system
        .add_texture(&mut backend, &TextureData::checkerboard(16, [0; 4], [255; 4]))
        .unwrap();
    system
        .create(EntityId(1), RenderComponent::new(mesh).with_texture(texture))
        .unwrap();
    let removed_group = system.texture(texture).unwrap().bind_group();

    assert!(system.remove_texture(&mut backend, texture));
    assert!(!system.remove_texture(&mut backend, texture));

    system
        .render(&mut backend, &TransformMap::new(), &Camera::default())
        .unwrap();

    let geometry = pass_commands(&backend, GEOMETRY);
    assert_eq!(count(&geometry, is_indexed_draw), 1);
    let bound = bind_groups_at(&geometry, 2);
    assert_eq!(bound.len(), 1);
    assert_ne!(bound[0], removed_group);
    assert!(backend.bind_group_entries(bound[0]).is_some());
}

#[test]
fn texture_with_short_pixel_data_is_rejected() {
    let (mut backend, mut system) = setup();
    let textures = backend.live_textures();
    let views = backend.live_texture_views();

    let result = system.add_texture(&mut backend, &TextureData::from_rgba8("short", 4, 4, vec![0u8; 3]));

    assert!(matches!(
        result,
        Err(RenderError::Backend(BackendError::TextureCreationFailed(_)))
    ));
    assert_eq!(backend.live_textures(), textures);
    assert_eq!(backend.live_texture_views(), views);
}

#[test]
fn texture_bind_failure_releases_texture() {
    let (mut backend, mut system) = setup();
    let textures = backend.live_textures();
    let bind_groups = backend.live_bind_groups();

    backend.fail_bind_groups_after(0);
    let result = system.add_texture(&mut backend, &TextureData::white());

    assert!(result.is_err());
    assert_eq!(backend.live_textures(), textures);
    assert_eq!(backend.live_bind_groups(), bind_groups);
}

#[test]
fn meshes_realize_on_first_frame() {
    let (mut backend, mut system) = setup();
    let mesh = cube_entities(&mut system, &[1]);
    let unused = system.add_mesh(Mesh::new("unused", MeshData::sphere(8, 4)));
    assert!(!system.mesh(mesh).unwrap().is_realized());

    system
        .render(&mut backend, &TransformMap::new(), &Camera::default())
        .unwrap();

    assert!(system.mesh(mesh).unwrap().is_realized());
    assert!(!system.mesh(unused).unwrap().is_realized());
}

#[test]
fn scene_transform_reaches_object_uniform() {
    let (mut backend, mut system) = setup();
    cube_entities(&mut system, &[1, 2]);
    let mut scene = TransformMap::new();
    scene.insert(EntityId(1), Transform::from_position(Vec3::new(3.0, 4.0, 5.0)));

    system
        .render(&mut backend, &scene, &Camera::default())
        .unwrap();

    let objects = bind_groups_at(&pass_commands(&backend, GEOMETRY), 1);
    assert_eq!(objects.len(), 2);

    // Column-major model matrix; translation is the fourth column
    let placed = uniform_floats(&backend, objects[0]);
    assert_eq!(&placed[12..15], &[3.0, 4.0, 5.0]);

    // No transform in the scene: identity
    let fallback = uniform_floats(&backend, objects[1]);
    assert_eq!(&fallback[12..15], &[0.0, 0.0, 0.0]);
    assert_eq!(fallback[0], 1.0);
}

#[test]
fn component_scale_and_tint_are_uploaded() {
    let (mut backend, mut system) = setup();
    let mesh = system.add_mesh(Mesh::new("cube", MeshData::cube()));
    let tint = Vec4::new(0.25, 0.5, 0.75, 1.0);
    system
        .create(
            EntityId(9),
            RenderComponent::new(mesh)
                .with_scale(Vec3::splat(2.0))
                .with_tint(tint),
        )
        .unwrap();

    system
        .render(&mut backend, &TransformMap::new(), &Camera::default())
        .unwrap();

    let objects = bind_groups_at(&pass_commands(&backend, GEOMETRY), 1);
    let floats = uniform_floats(&backend, objects[0]);
    assert_eq!(floats[0], 2.0);
    assert_eq!(floats[5], 2.0);
    assert_eq!(floats[10], 2.0);
    // model, normal matrix, then tint
    assert!((floats[16] - 0.5).abs() < 1e-6);
    assert_eq!(&floats[32..36], &[0.25, 0.5, 0.75, 1.0]);
}

#[test]
fn scene_scale_combines_with_component_scale() {
    let (mut backend, mut system) = setup();
    let mesh = system.add_mesh(Mesh::new("cube", MeshData::cube()));
    system
        .create(EntityId(4), RenderComponent::new(mesh).with_scale(Vec3::splat(2.0)))
        .unwrap();
    let mut scene = TransformMap::new();
    scene.insert(EntityId(4), Transform::new().with_scale(Vec3::new(3.0, 1.0, 1.0)));

    system
        .render(&mut backend, &scene, &Camera::default())
        .unwrap();

    let objects = bind_groups_at(&pass_commands(&backend, GEOMETRY), 1);
    let floats = uniform_floats(&backend, objects[0]);
    assert!((floats[0] - 6.0).abs() < 1e-6);
    assert!((floats[5] - 2.0).abs() < 1e-6);
    // Normal matrix is the inverse transpose of the combined model
    assert!((floats[16] - 1.0 / 6.0).abs() < 1e-6);
    assert!((floats[21] - 0.5).abs() < 1e-6);
}

// ============================================================================
// Light Pass Tests
// ============================================================================

#[rstest]
#[case::none(0, 0, 0)]
#[case::directional_only(2, 0, 0)]
#[case::mixed(1, 2, 3)]
fn one_fullscreen_draw_per_light(
    #[case] directional: usize,
    #[case] point: usize,
    #[case] spot: usize,
) {
    let (mut backend, mut system) = setup();
    for _ in 0..directional {
        system
            .directional_lights
            .push(DirectionalLight::new(Vec3::NEG_Y, Vec3::ONE, 1.0));
    }
    for i in 0..point {
        system
            .point_lights
            .push(PointLight::new(Vec3::new(i as f32, 1.0, 0.0), Vec3::ONE, 2.0));
    }
    for _ in 0..spot {
        system.spot_lights.push(SpotLight::new(
            PointLight::new(Vec3::Y * 4.0, Vec3::ONE, 2.0),
            Vec3::NEG_Y,
            0.5,
        ));
    }

    system
        .render(&mut backend, &TransformMap::new(), &Camera::default())
        .unwrap();

    let light = pass_commands(&backend, LIGHT);
    let draws = count(&light, |c| {
        matches!(c, Command::Draw { vertices, instances } if *vertices == (0..3) && *instances == (0..1))
    });
    assert_eq!(draws, directional + point + spot);

    let kinds: Vec<f32> = bind_groups_at(&light, 2)
        .into_iter()
        .map(|group| uniform_floats(&backend, group)[11])
        .collect();
    let expected: Vec<f32> = std::iter::repeat(0.0)
        .take(directional)
        .chain(std::iter::repeat(1.0).take(point))
        .chain(std::iter::repeat(2.0).take(spot))
        .collect();
    assert_eq!(kinds, expected);
}

#[test]
fn lights_without_direction_are_skipped() {
    let (mut backend, mut system) = setup();
    system
        .directional_lights
        .push(DirectionalLight::new(Vec3::ZERO, Vec3::ONE, 1.0));
    system
        .directional_lights
        .push(DirectionalLight::new(Vec3::NEG_Y, Vec3::ONE, 1.0));
    system.point_lights.push(PointLight::new(Vec3::Y, Vec3::ONE, 2.0));
    system.spot_lights.push(SpotLight::new(
        PointLight::new(Vec3::Y * 4.0, Vec3::ONE, 2.0),
        Vec3::ZERO,
        0.5,
    ));

    system
        .render(&mut backend, &TransformMap::new(), &Camera::default())
        .unwrap();

    let light = pass_commands(&backend, LIGHT);
    assert_eq!(count(&light, |c| matches!(c, Command::Draw { .. })), 2);

    let kinds: Vec<f32> = bind_groups_at(&light, 2)
        .into_iter()
        .map(|group| uniform_floats(&backend, group)[11])
        .collect();
    assert_eq!(kinds, vec![0.0, 1.0]);
    for group in bind_groups_at(&light, 2) {
        assert!(uniform_floats(&backend, group).iter().all(|f| !f.is_nan()));
    }
}

#[test]
fn light_pass_binds_camera_and_gbuffer() {
    let (mut backend, mut system) = setup();

    system
        .render(&mut backend, &TransformMap::new(), &Camera::default())
        .unwrap();

    let light = pass_commands(&backend, LIGHT);
    assert_eq!(bind_groups_at(&light, 0).len(), 1);
    assert_eq!(bind_groups_at(&light, 1).len(), 1);
    // Camera group is shared with the geometry pass
    assert_eq!(
        bind_groups_at(&light, 0),
        bind_groups_at(&pass_commands(&backend, GEOMETRY), 0)
    );
}

#[test]
fn ambient_term_reaches_composite() {
    let (mut backend, mut system) = setup();
    system.ambient_color = Vec3::new(1.0, 0.5, 0.0);
    system.ambient_intensity = 0.5;

    system
        .render(&mut backend, &TransformMap::new(), &Camera::default())
        .unwrap();

    let composite = bind_groups_at(&pass_commands(&backend, COMPOSITE), 0);
    assert_eq!(composite.len(), 1);
    let floats = uniform_floats(&backend, composite[0]);
    assert_eq!(&floats[0..3], &[0.5, 0.25, 0.0]);
}

// ============================================================================
// Lifetime Tests
// ============================================================================

#[test]
fn shutdown_releases_everything() {
    let (mut backend, mut system) = setup();
    cube_entities(&mut system, &[1, 2]);
    system
        .add_texture(&mut backend, &TextureData::white())
        .unwrap();
    system
        .point_lights
        .push(PointLight::new(Vec3::ONE, Vec3::ONE, 1.0));
    system
        .render(&mut backend, &TransformMap::new(), &Camera::default())
        .unwrap();
    assert!(backend.live_buffers() > 0);

    system.shutdown(&mut backend);

    assert_eq!(backend.live_buffers(), 0);
    assert_eq!(backend.live_textures(), 0);
    assert_eq!(backend.live_texture_views(), 0);
    assert_eq!(backend.live_bind_groups(), 0);
}

#[test]
fn repeated_frames_reuse_uniform_pools() {
    let (mut backend, mut system) = setup();
    cube_entities(&mut system, &[1, 2, 3]);
    system
        .directional_lights
        .push(DirectionalLight::new(Vec3::NEG_Y, Vec3::ONE, 1.0));

    system
        .render(&mut backend, &TransformMap::new(), &Camera::default())
        .unwrap();
    let created = backend.buffers_created();

    for _ in 0..3 {
        system
            .render(&mut backend, &TransformMap::new(), &Camera::default())
            .unwrap();
    }

    assert_eq!(backend.buffers_created(), created);
    assert_eq!(backend.frames(), 4);
}
