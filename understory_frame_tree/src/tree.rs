// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core tree implementation: storage, structure, attributes, lifecycle.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use kurbo::{Affine, Point, Rect, Size};
use tracing::{debug, error, trace, warn};

use crate::behavior::{FrameBehavior, FrameCx};
use crate::error::FrameError;
use crate::event::UpdateTick;
use crate::geometry::{FrameGeometry, FrameTransforms};
use crate::screen::{RenderTarget, Screen};
use crate::types::{BlendMode, Color, FrameFlags, FrameId, FrameTreeConfig, PixelFormat};

/// A retained tree of frames bound to at most one [`Screen`].
///
/// Frames are created detached with [`FrameTree::insert`] and linked with
/// [`FrameTree::add_child`]. Once a root is attached with [`FrameTree::attach_screen`],
/// every frame reachable from it is *loaded*: it has a content resolution derived from
/// the screen, receives lifecycle hooks, and may own a cached surface.
///
/// ## Example
///
/// ```rust
/// use kurbo::{Affine, Size};
/// use understory_frame_tree::{FrameTree, PlainFrame};
///
/// let mut tree = FrameTree::new();
/// let panel = tree.insert(PlainFrame);
/// let button = tree.insert(PlainFrame);
/// tree.add_child(panel, button).unwrap();
/// tree.set_content_scale(button, Size::new(80.0, 24.0)).unwrap();
/// tree.set_transform(button, Affine::scale(0.5)).unwrap();
///
/// assert_eq!(tree.children_of(panel), &[button]);
/// assert_eq!(tree.parent_of(button), Some(panel));
/// assert!(!tree.is_loaded(button));
/// ```
pub struct FrameTree {
    /// slots
    nodes: Vec<Option<Node>>,
    /// last generation per slot (persists across frees)
    generations: Vec<u32>,
    free_list: Vec<usize>,
    pub(crate) config: FrameTreeConfig,
    pub(crate) screen: Option<Box<dyn Screen>>,
    pub(crate) root: Option<FrameId>,
}

impl core::fmt::Debug for FrameTree {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let total = self.nodes.len();
        let alive = self.nodes.iter().filter(|n| n.is_some()).count();
        f.debug_struct("FrameTree")
            .field("nodes_total", &total)
            .field("nodes_alive", &alive)
            .field("free_list", &self.free_list.len())
            .field("config", &self.config)
            .field("root", &self.root)
            .field("has_screen", &self.screen.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for FrameTree {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) struct Node {
    generation: u32,
    pub(crate) parent: Option<FrameId>,
    /// Front to back: index 0 is drawn last and hit first.
    pub(crate) children: Vec<FrameId>,
    pub(crate) geometry: FrameGeometry,
    pub(crate) color: Color,
    pub(crate) blend: BlendMode,
    pub(crate) flags: FrameFlags,
    pub(crate) pixel_format: PixelFormat,
    pub(crate) needs_redraw: Cell<bool>,
    pub(crate) surface: RefCell<Option<Rc<dyn RenderTarget>>>,
    pub(crate) loaded: bool,
    /// `None` while a hook borrows it.
    pub(crate) behavior: Option<Box<dyn FrameBehavior>>,
}

impl core::fmt::Debug for Node {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Node")
            .field("generation", &self.generation)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("geometry", &self.geometry)
            .field("flags", &self.flags)
            .field("loaded", &self.loaded)
            .field("needs_redraw", &self.needs_redraw.get())
            .field("has_surface", &self.surface.borrow().is_some())
            .finish_non_exhaustive()
    }
}

impl Node {
    fn new(generation: u32, behavior: Box<dyn FrameBehavior>) -> Self {
        Self {
            generation,
            parent: None,
            children: Vec::new(),
            geometry: FrameGeometry::default(),
            color: Color::WHITE,
            blend: BlendMode::default(),
            flags: FrameFlags::default(),
            pixel_format: PixelFormat::default(),
            needs_redraw: Cell::new(true),
            surface: RefCell::new(None),
            loaded: false,
            behavior: Some(behavior),
        }
    }

    pub(crate) fn is_hidden(&self) -> bool {
        !self.flags.contains(FrameFlags::VISIBLE)
    }
}

impl FrameTree {
    /// Create an empty tree with the default [`FrameTreeConfig`].
    pub fn new() -> Self {
        Self::with_config(FrameTreeConfig::default())
    }

    /// Create an empty tree with explicit tunables.
    pub fn with_config(config: FrameTreeConfig) -> Self {
        Self {
            nodes: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            config,
            screen: None,
            root: None,
        }
    }

    /// Tunables this tree was built with.
    pub fn config(&self) -> &FrameTreeConfig {
        &self.config
    }

    /// Create a detached frame driven by `behavior`.
    ///
    /// The frame starts with identity transforms, a 1×1 content scale, and no parent.
    pub fn insert<B: FrameBehavior + 'static>(&mut self, behavior: B) -> FrameId {
        let node = |generation| Node::new(generation, Box::new(behavior));
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.nodes[idx] = Some(node(generation));
            (idx, generation)
        } else {
            let generation = 1_u32;
            self.nodes.push(Some(node(generation)));
            self.generations.push(generation);
            (self.nodes.len() - 1, generation)
        };
        #[allow(
            clippy::cast_possible_truncation,
            reason = "FrameId uses 32-bit indices by design."
        )]
        let id = FrameId::new(idx as u32, generation);
        trace!(?id, "inserted frame");
        id
    }

    /// Destroy a frame and its whole subtree.
    ///
    /// Destroying a loaded frame is a lifecycle mistake: it is detached (and unloaded)
    /// first, with a warning. Every id in the subtree becomes stale.
    pub fn remove(&mut self, id: FrameId) {
        if !self.is_alive(id) {
            return;
        }
        if self.node(id).loaded {
            warn!(?id, "destroying a loaded frame, detaching it first");
            if self.root == Some(id) {
                self.unload_recursive(id);
                self.root = None;
            }
        }
        if let Some(parent) = self.parent_of(id) {
            self.remove_child(parent, id);
        }
        // An unload hook may already have destroyed the frame.
        if !self.is_alive(id) {
            return;
        }
        self.free_subtree(id);
    }

    fn free_subtree(&mut self, id: FrameId) {
        let children = core::mem::take(&mut self.node_mut(id).children);
        for child in children {
            if self.is_alive(child) {
                self.free_subtree(child);
            }
        }
        self.nodes[id.idx()] = None;
        self.free_list.push(id.idx());
    }

    // --- screen binding ---

    /// Bind `screen` to the tree with `root` as its root frame, loading the subtree.
    ///
    /// `resolution` seeds the load pass; the root then tracks
    /// [`Screen::resolution`]. A previously attached screen is detached first.
    pub fn attach_screen(
        &mut self,
        root: FrameId,
        screen: Box<dyn Screen>,
        resolution: Size,
    ) -> Result<(), FrameError> {
        self.check_alive(root)?;
        if self.node(root).parent.is_some() {
            return Err(FrameError::AlreadyAttached(root));
        }
        if self.screen.is_some() {
            debug!("replacing attached screen");
            drop(self.detach_screen());
        }
        self.screen = Some(screen);
        self.root = Some(root);
        self.load_recursive(root, resolution);
        Ok(())
    }

    /// Unload the root's subtree and hand the screen back.
    pub fn detach_screen(&mut self) -> Option<Box<dyn Screen>> {
        if let Some(root) = self.root {
            self.unload_recursive(root);
        }
        self.root = None;
        self.screen.take()
    }

    /// The attached screen, if any.
    pub fn screen(&self) -> Option<&dyn Screen> {
        self.screen.as_deref()
    }

    /// The attached screen, mutably.
    pub fn screen_mut(&mut self) -> Option<&mut (dyn Screen + 'static)> {
        self.screen.as_deref_mut()
    }

    /// The root frame registered with the screen.
    pub fn root(&self) -> Option<FrameId> {
        self.root
    }

    /// Returns `true` if `id` is the registered root frame.
    pub fn is_root(&self, id: FrameId) -> bool {
        self.root == Some(id)
    }

    // --- structure ---

    /// Attach `child` at the front of `parent`'s children.
    ///
    /// Fails without changing anything if `child` already has a parent, is the root
    /// frame, or is `parent` itself or one of its ancestors. If `parent` is loaded the
    /// child's subtree is loaded with the parent's resolution.
    pub fn add_child(&mut self, parent: FrameId, child: FrameId) -> Result<(), FrameError> {
        self.check_alive(parent)?;
        self.check_alive(child)?;
        if self.is_root(child) {
            return Err(FrameError::RootFrame(child));
        }
        if self.node(child).parent.is_some() {
            return Err(FrameError::AlreadyAttached(child));
        }
        if self.is_descendant_of(parent, child) {
            return Err(FrameError::WouldCycle { parent, child });
        }

        self.node_mut(parent).children.insert(0, child);
        self.node_mut(child).parent = Some(parent);
        trace!(?parent, ?child, "attached frame");

        if self.node(parent).loaded {
            let resolution = self.node(parent).geometry.content_resolution();
            self.load_recursive(child, resolution);
            self.update_content_resolution(child);
            self.set_redraw(parent);
        }
        Ok(())
    }

    /// Detach `child` from `parent` and unload its subtree.
    ///
    /// Capture claims held by `child` are released first, firing
    /// [`FrameBehavior::on_mouse_released`] and [`FrameBehavior::on_keyboard_released`]
    /// for each device. Returns `false` if `child` is not a child of `parent`.
    pub fn remove_child(&mut self, parent: FrameId, child: FrameId) -> bool {
        if !self.is_alive(parent) || self.parent_of(child) != Some(parent) {
            return false;
        }
        if self.node(child).loaded {
            self.release_claims_notifying(child);
        }
        if let Some(p) = self.node_opt_mut(parent) {
            p.children.retain(|&c| c != child);
        }
        if let Some(c) = self.node_opt_mut(child) {
            c.parent = None;
        }
        trace!(?parent, ?child, "detached frame");
        self.unload_recursive(child);
        self.set_redraw(parent);
        true
    }

    /// Detach `id` from whatever parent it has.
    pub fn remove_from_parent(&mut self, id: FrameId) -> bool {
        match self.parent_of(id) {
            Some(parent) => self.remove_child(parent, id),
            None => false,
        }
    }

    /// Move `child` to the front of its siblings.
    ///
    /// Returns `true` if `child` is a child of `parent`, whether or not it moved.
    pub fn bring_to_front(&mut self, parent: FrameId, child: FrameId) -> bool {
        if !self.is_alive(parent) || self.parent_of(child) != Some(parent) {
            return false;
        }
        let children = &mut self.node_mut(parent).children;
        let Some(index) = children.iter().position(|&c| c == child) else {
            return false;
        };
        if index > 0 {
            children.remove(index);
            children.insert(0, child);
            self.set_redraw(parent);
        }
        true
    }

    /// Move `child` to the back of its siblings.
    ///
    /// The parent loses hover for every device, since the topmost frame under the
    /// pointer may change. Returns `true` if `child` is a child of `parent`.
    pub fn send_to_back(&mut self, parent: FrameId, child: FrameId) -> bool {
        if !self.is_alive(parent) || self.parent_of(child) != Some(parent) {
            return false;
        }
        if self.node(parent).loaded
            && let Some(screen) = self.screen.as_deref_mut()
        {
            screen.leave_hover_frame(parent);
        }
        let children = &mut self.node_mut(parent).children;
        let Some(index) = children.iter().position(|&c| c == child) else {
            return false;
        };
        if index + 1 < children.len() {
            children.remove(index);
            children.push(child);
            self.set_redraw(parent);
        }
        true
    }

    /// Returns `true` if `ancestor` is `id` or one of its ancestors.
    pub fn is_descendant_of(&self, id: FrameId, ancestor: FrameId) -> bool {
        if !self.is_alive(id) || !self.is_alive(ancestor) {
            return false;
        }
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent_of(current);
        }
        false
    }

    // --- queries ---

    /// Returns true if `id` refers to a live frame.
    ///
    /// See [`FrameId`] for the generational semantics.
    pub fn is_alive(&self, id: FrameId) -> bool {
        self.nodes
            .get(id.idx())
            .and_then(|n| n.as_ref())
            .is_some_and(|n| n.generation == id.1)
    }

    /// Returns `true` if the frame is attached to the screen through the root.
    pub fn is_loaded(&self, id: FrameId) -> bool {
        self.node_opt(id).is_some_and(|n| n.loaded)
    }

    /// Parent of a frame, or `None` for detached frames, the root, and stale ids.
    pub fn parent_of(&self, id: FrameId) -> Option<FrameId> {
        self.node_opt(id).and_then(|n| n.parent)
    }

    /// Children of a frame, front to back, or an empty slice if `id` is stale.
    pub fn children_of(&self, id: FrameId) -> &[FrameId] {
        match self.node_opt(id) {
            Some(n) => &n.children,
            None => &[],
        }
    }

    /// Child at `index` (0 = front).
    pub fn child_at(&self, parent: FrameId, index: usize) -> Option<FrameId> {
        self.children_of(parent).get(index).copied()
    }

    /// Size of the subtree rooted at `id`, counting `id` itself. 0 for stale ids.
    pub fn number_of_descendants(&self, id: FrameId) -> usize {
        if !self.is_alive(id) {
            return 0;
        }
        1 + self
            .node(id)
            .children
            .iter()
            .map(|&c| self.number_of_descendants(c))
            .sum::<usize>()
    }

    /// Geometry of a frame.
    pub fn geometry(&self, id: FrameId) -> Option<&FrameGeometry> {
        self.node_opt(id).map(|n| &n.geometry)
    }

    /// Tint applied when the frame is composited into its parent.
    pub fn color(&self, id: FrameId) -> Option<Color> {
        self.node_opt(id).map(|n| n.color)
    }

    /// Blend mode used when the frame is composited into its parent.
    pub fn blend(&self, id: FrameId) -> Option<BlendMode> {
        self.node_opt(id).map(|n| n.blend)
    }

    /// Visibility and interaction flags.
    pub fn flags(&self, id: FrameId) -> Option<FrameFlags> {
        self.node_opt(id).map(|n| n.flags)
    }

    /// Pixel format of the frame's cached surface.
    pub fn pixel_format(&self, id: FrameId) -> Option<PixelFormat> {
        self.node_opt(id).map(|n| n.pixel_format)
    }

    /// Returns `true` if the frame is hidden. Stale ids report hidden.
    pub fn is_hidden(&self, id: FrameId) -> bool {
        self.node_opt(id).is_none_or(Node::is_hidden)
    }

    /// Returns `true` if the frame is enabled.
    pub fn is_enabled(&self, id: FrameId) -> bool {
        self.node_opt(id)
            .is_some_and(|n| n.flags.contains(FrameFlags::ENABLED))
    }

    /// Returns `true` if the frame's surface is stale.
    pub fn needs_redraw(&self, id: FrameId) -> bool {
        self.node_opt(id).is_some_and(|n| n.needs_redraw.get())
    }

    /// Returns `true` if the frame currently owns a cached surface.
    pub fn has_surface(&self, id: FrameId) -> bool {
        self.node_opt(id)
            .is_some_and(|n| n.surface.borrow().is_some())
    }

    /// Mark a frame's surface stale. Takes `&self`: the dirty flag is a cache bit.
    pub fn set_redraw(&self, id: FrameId) {
        if let Some(n) = self.node_opt(id) {
            n.needs_redraw.set(true);
        }
    }

    // --- attributes ---

    /// Replace the placement transform (normalized space to parent local space).
    ///
    /// Rejected for the root frame. On change the frame's resolution is recomputed
    /// and the parent is marked dirty.
    pub fn set_transform(&mut self, id: FrameId, transform: Affine) -> Result<(), FrameError> {
        self.check_alive(id)?;
        if self.is_root(id) {
            warn!(?id, "root frame's transform cannot be changed");
            return Err(FrameError::RootPolicy("transform"));
        }
        if self.node_mut(id).geometry.set_transform(transform) {
            self.update_content_resolution(id);
            if let Some(parent) = self.parent_of(id) {
                self.set_redraw(parent);
            }
        }
        Ok(())
    }

    /// Replace the content scale (logical size of the drawing surface).
    ///
    /// Components are clamped to [`FrameTreeConfig::min_content_scale`]; changes
    /// within [`FrameTreeConfig::scale_epsilon`] are ignored.
    pub fn set_content_scale(&mut self, id: FrameId, scale: Size) -> Result<(), FrameError> {
        self.check_alive(id)?;
        let FrameTreeConfig {
            min_content_scale,
            scale_epsilon,
            ..
        } = self.config;
        if self
            .node_mut(id)
            .geometry
            .set_content_scale(scale, min_content_scale, scale_epsilon)
        {
            self.set_redraw(id);
            self.update_content_resolution(id);
        }
        Ok(())
    }

    /// Replace the content transform. A non-invertible matrix becomes identity.
    pub fn set_content_transform(&mut self, id: FrameId, m: Affine) -> Result<(), FrameError> {
        self.check_alive(id)?;
        if self.node_mut(id).geometry.set_content_transform(m) {
            self.set_redraw(id);
            self.update_content_resolution(id);
        }
        Ok(())
    }

    /// Set the compositing tint. Rejected for the root frame.
    pub fn set_color(&mut self, id: FrameId, color: Color) -> Result<(), FrameError> {
        self.check_alive(id)?;
        if self.is_root(id) {
            warn!(?id, "root frame's color cannot be changed");
            return Err(FrameError::RootPolicy("color"));
        }
        let node = self.node_mut(id);
        if node.color != color {
            node.color = color;
            self.redraw_parent(id);
        }
        Ok(())
    }

    /// Set the compositing blend mode. Rejected for the root frame.
    pub fn set_blend(&mut self, id: FrameId, blend: BlendMode) -> Result<(), FrameError> {
        self.check_alive(id)?;
        if self.is_root(id) {
            warn!(?id, "root frame's blend mode cannot be changed");
            return Err(FrameError::RootPolicy("blend mode"));
        }
        let node = self.node_mut(id);
        if node.blend != blend {
            node.blend = blend;
            self.redraw_parent(id);
        }
        Ok(())
    }

    /// Hide or show a frame. The root frame is always visible.
    ///
    /// Hiding drops the frame's hover claims. The parent is marked dirty.
    pub fn set_hidden(&mut self, id: FrameId, hidden: bool) -> Result<(), FrameError> {
        self.check_alive(id)?;
        if self.is_root(id) {
            warn!(?id, "root frame is always visible");
            return Err(FrameError::RootPolicy("visibility"));
        }
        let node = self.node_mut(id);
        if node.is_hidden() == hidden {
            return Ok(());
        }
        node.flags.set(FrameFlags::VISIBLE, !hidden);
        if hidden {
            self.leave_hover(id);
        }
        self.redraw_parent(id);
        Ok(())
    }

    /// Enable or disable input. Disabling drops the frame's hover claims.
    pub fn set_enabled(&mut self, id: FrameId, enabled: bool) -> Result<(), FrameError> {
        self.check_alive(id)?;
        let node = self.node_mut(id);
        if node.flags.contains(FrameFlags::ENABLED) == enabled {
            return Ok(());
        }
        node.flags.set(FrameFlags::ENABLED, enabled);
        if !enabled {
            self.leave_hover(id);
        }
        self.set_redraw(id);
        Ok(())
    }

    /// Opt the frame in or out of user input events.
    pub fn set_input_events_enabled(&mut self, id: FrameId, enabled: bool) -> Result<(), FrameError> {
        self.check_alive(id)?;
        self.node_mut(id)
            .flags
            .set(FrameFlags::INPUT_EVENTS, enabled);
        Ok(())
    }

    /// Change the pixel format of the cached surface, discarding it.
    ///
    /// Rejected for the root frame (whose surface is the screen) and for formats
    /// that cannot back a color target.
    pub fn set_pixel_format(&mut self, id: FrameId, format: PixelFormat) -> Result<(), FrameError> {
        self.check_alive(id)?;
        if self.is_root(id) {
            error!(?id, "root frame's pixel format follows the screen");
            return Err(FrameError::RootPolicy("pixel format"));
        }
        if self.node(id).pixel_format == format {
            return Ok(());
        }
        if !format.is_color_format() {
            error!(?id, ?format, "not a color pixel format");
            return Err(FrameError::UnsupportedPixelFormat(format));
        }
        let node = self.node_mut(id);
        node.pixel_format = format;
        node.surface.get_mut().take();
        node.needs_redraw.set(true);
        Ok(())
    }

    /// Snapshot of the placement and content transforms.
    pub fn transforms(&self, id: FrameId) -> Option<FrameTransforms> {
        self.geometry(id).map(FrameGeometry::transforms)
    }

    /// Apply a snapshot taken with [`FrameTree::transforms`].
    ///
    /// Inverses are recomputed the same way the individual setters do.
    pub fn restore_transforms(
        &mut self,
        id: FrameId,
        transforms: FrameTransforms,
    ) -> Result<(), FrameError> {
        self.set_transform(id, transforms.transform)?;
        self.set_content_transform(id, transforms.content_transform)
    }

    // --- coordinate queries ---

    /// Local space to parent local space; identity for frames without a parent.
    pub fn local_to_super_transform(&self, id: FrameId) -> Option<Affine> {
        let node = self.node_opt(id)?;
        Some(if node.parent.is_some() {
            node.geometry.local_to_super_transform()
        } else {
            Affine::IDENTITY
        })
    }

    /// Parent local space to local space; identity for frames without a parent.
    pub fn local_from_super_transform(&self, id: FrameId) -> Option<Affine> {
        let node = self.node_opt(id)?;
        Some(if node.parent.is_some() {
            node.geometry.local_from_super_transform()
        } else {
            Affine::IDENTITY
        })
    }

    /// Local space to the local space of the topmost ancestor.
    pub fn local_to_root_transform(&self, id: FrameId) -> Option<Affine> {
        let to_super = self.local_to_super_transform(id)?;
        Some(match self.parent_of(id) {
            Some(parent) => self.local_to_root_transform(parent)? * to_super,
            None => to_super,
        })
    }

    /// Local space of the topmost ancestor to local space.
    pub fn local_from_root_transform(&self, id: FrameId) -> Option<Affine> {
        let from_super = self.local_from_super_transform(id)?;
        Some(match self.parent_of(id) {
            Some(parent) => from_super * self.local_from_root_transform(parent)?,
            None => from_super,
        })
    }

    /// Map a local point into the topmost ancestor's local space.
    pub fn local_to_root(&self, id: FrameId, p: Point) -> Option<Point> {
        Some(self.local_to_root_transform(id)? * p)
    }

    /// Map a point in the topmost ancestor's local space into local space.
    pub fn root_to_local(&self, id: FrameId, p: Point) -> Option<Point> {
        Some(self.local_from_root_transform(id)? * p)
    }

    /// Map a local point into the parent's local space.
    pub fn local_to_super(&self, id: FrameId, p: Point) -> Option<Point> {
        Some(self.local_to_super_transform(id)? * p)
    }

    /// Map a point in the parent's local space into local space.
    pub fn super_to_local(&self, id: FrameId, p: Point) -> Option<Point> {
        Some(self.local_from_super_transform(id)? * p)
    }

    /// Map a local point to surface pixels.
    pub fn local_to_pixel(&self, id: FrameId, p: Point) -> Option<Point> {
        self.geometry(id).map(|g| g.local_to_pixel(p))
    }

    /// Map a surface pixel position to local space.
    pub fn pixel_to_local(&self, id: FrameId, p: Point) -> Option<Point> {
        self.geometry(id).map(|g| g.pixel_to_local(p))
    }

    /// `(0, 0, content_scale)` of the frame.
    pub fn bounds(&self, id: FrameId) -> Option<Rect> {
        self.geometry(id).map(FrameGeometry::bounds)
    }

    /// Region of local coordinates that lands on the frame's surface.
    pub fn display_bounds(&self, id: FrameId) -> Option<Rect> {
        self.geometry(id).map(FrameGeometry::display_bounds)
    }

    // --- update pass ---

    /// Run [`FrameBehavior::on_update`] on `id` and then on its subtree, parents first.
    pub fn update(&mut self, id: FrameId, tick: &UpdateTick) {
        if !self.is_loaded(id) {
            debug!(?id, "skipping update of an unloaded frame");
            return;
        }
        self.with_behavior(id, |b, cx| b.on_update(cx, tick));
        for child in self.children_snapshot(id) {
            self.update(child, tick);
        }
    }

    // --- lifecycle ---

    pub(crate) fn load_recursive(&mut self, id: FrameId, resolution: Size) {
        if !self.wants_load(id) {
            return;
        }
        self.node_mut(id)
            .geometry
            .set_content_resolution(Size::new(
                resolution.width.max(1.0),
                resolution.height.max(1.0),
            ));
        let projected = self.calculate_content_resolution(id);
        self.node_mut(id).geometry.set_content_resolution(projected);

        self.with_behavior(id, |b, cx| b.on_loaded(cx));
        // The hook may have detached the frame, or re-attached and loaded it already.
        if !self.wants_load(id) {
            trace!(?id, "frame left the tree while loading");
            return;
        }
        self.node_mut(id).loaded = true;
        self.with_behavior(id, |b, cx| b.on_content_resized(cx));
        if !self.is_loaded(id) {
            return;
        }
        self.update_content_resolution(id);

        for child in self.children_snapshot(id) {
            self.load_recursive(child, resolution);
        }
        self.set_redraw(id);
        trace!(?id, "loaded frame");
    }

    /// Live, not yet loaded, and either the root or under a loaded parent.
    fn wants_load(&self, id: FrameId) -> bool {
        let Some(node) = self.node_opt(id) else {
            return false;
        };
        !node.loaded
            && (self.is_root(id) || node.parent.is_some_and(|p| self.is_loaded(p)))
    }

    pub(crate) fn unload_recursive(&mut self, id: FrameId) {
        for child in self.children_snapshot(id) {
            self.unload_recursive(child);
        }
        if !self.is_loaded(id) {
            return;
        }
        if let Some(screen) = self.screen.as_deref_mut() {
            screen.leave_hover_frame(id);
            let claims = screen.claims_mut();
            claims.remove_focus_frame_for_any_device(id);
            claims.remove_key_frame_for_any_device(id);
        }
        self.with_behavior(id, |b, cx| b.on_unload(cx));
        if let Some(node) = self.node_opt_mut(id) {
            node.surface.get_mut().take();
            node.loaded = false;
        }
        trace!(?id, "unloaded frame");
    }

    /// Release every claim `id` holds, telling its behavior about each lost capture.
    fn release_claims_notifying(&mut self, id: FrameId) {
        let Some(screen) = self.screen.as_deref_mut() else {
            return;
        };
        screen.leave_hover_frame(id);
        let mice = screen.claims_mut().remove_focus_frame_for_any_device(id);
        let keyboards = screen.claims_mut().remove_key_frame_for_any_device(id);
        for device in mice {
            self.with_behavior(id, |b, cx| b.on_mouse_released(cx, device));
        }
        for device in keyboards {
            self.with_behavior(id, |b, cx| b.on_keyboard_released(cx, device));
        }
    }

    pub(crate) fn leave_hover(&mut self, id: FrameId) {
        if self.is_loaded(id)
            && let Some(screen) = self.screen.as_deref_mut()
        {
            screen.leave_hover_frame(id);
        }
    }

    fn redraw_parent(&self, id: FrameId) {
        if let Some(parent) = self.parent_of(id) {
            self.set_redraw(parent);
        }
    }

    // --- internals ---

    /// Lend the frame's behavior to `f` along with a context over the whole tree.
    ///
    /// Returns `None` if `id` is stale or its behavior is already lent out.
    pub(crate) fn with_behavior<R>(
        &mut self,
        id: FrameId,
        f: impl FnOnce(&mut dyn FrameBehavior, &mut FrameCx<'_>) -> R,
    ) -> Option<R> {
        let mut behavior = self.node_opt_mut(id)?.behavior.take()?;
        let out = {
            let mut cx = FrameCx {
                tree: self,
                frame: id,
            };
            f(&mut *behavior, &mut cx)
        };
        // The hook may have destroyed the frame; the behavior is dropped with it.
        if let Some(node) = self.node_opt_mut(id)
            && node.behavior.is_none()
        {
            node.behavior = Some(behavior);
        }
        Some(out)
    }

    /// The frame's behavior for read-only hooks, if it is not lent out.
    pub(crate) fn behavior(&self, id: FrameId) -> Option<&dyn FrameBehavior> {
        self.node_opt(id)?.behavior.as_deref()
    }

    pub(crate) fn children_snapshot(&self, id: FrameId) -> Vec<FrameId> {
        self.children_of(id).to_vec()
    }

    fn check_alive(&self, id: FrameId) -> Result<(), FrameError> {
        if self.is_alive(id) {
            Ok(())
        } else {
            Err(FrameError::StaleFrame(id))
        }
    }

    /// Access a node; panics if `id` is stale.
    pub(crate) fn node(&self, id: FrameId) -> &Node {
        self.nodes[id.idx()].as_ref().expect("dangling FrameId")
    }

    /// Access a node mutably; panics if `id` is stale.
    pub(crate) fn node_mut(&mut self, id: FrameId) -> &mut Node {
        self.nodes[id.idx()].as_mut().expect("dangling FrameId")
    }

    pub(crate) fn node_opt(&self, id: FrameId) -> Option<&Node> {
        let n = self.nodes.get(id.idx())?.as_ref()?;
        (n.generation == id.1).then_some(n)
    }

    fn node_opt_mut(&mut self, id: FrameId) -> Option<&mut Node> {
        let n = self.nodes.get_mut(id.idx())?.as_mut()?;
        if n.generation != id.1 {
            return None;
        }
        Some(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::PlainFrame;
    use crate::testing::{Journal, MockScreen, Note, Probe, journal, tick};

    fn loaded_root(tree: &mut FrameTree) -> (FrameId, crate::testing::ScreenProbe) {
        let root = tree.insert(PlainFrame);
        let (screen, probe) = MockScreen::new(800.0, 600.0);
        tree.attach_screen(root, screen, Size::new(800.0, 600.0))
            .unwrap();
        (root, probe)
    }

    fn clear_dirty(tree: &FrameTree) {
        for n in tree.nodes.iter().flatten() {
            n.needs_redraw.set(false);
        }
    }

    #[test]
    fn new_child_goes_to_front() {
        let mut tree = FrameTree::new();
        let p = tree.insert(PlainFrame);
        let a = tree.insert(PlainFrame);
        let b = tree.insert(PlainFrame);
        tree.add_child(p, a).unwrap();
        tree.add_child(p, b).unwrap();
        assert_eq!(tree.children_of(p), &[b, a]);
        assert_eq!(tree.child_at(p, 0), Some(b));
        assert_eq!(tree.child_at(p, 2), None);
        assert_eq!(tree.number_of_descendants(p), 3);
    }

    #[test]
    fn attach_rejects_cycles_and_second_parents() {
        let mut tree = FrameTree::new();
        let a = tree.insert(PlainFrame);
        let b = tree.insert(PlainFrame);
        let c = tree.insert(PlainFrame);
        tree.add_child(a, b).unwrap();
        tree.add_child(b, c).unwrap();

        assert_eq!(
            tree.add_child(c, a),
            Err(FrameError::WouldCycle {
                parent: c,
                child: a
            })
        );
        assert_eq!(
            tree.add_child(a, a),
            Err(FrameError::WouldCycle {
                parent: a,
                child: a
            })
        );
        assert_eq!(tree.add_child(a, c), Err(FrameError::AlreadyAttached(c)));

        // Both chains untouched.
        assert_eq!(tree.parent_of(a), None);
        assert_eq!(tree.children_of(a), &[b]);
        assert_eq!(tree.children_of(b), &[c]);
        assert!(tree.children_of(c).is_empty());
        assert!(tree.is_descendant_of(c, a));
        assert!(!tree.is_descendant_of(a, c));
    }

    #[test]
    fn reorder_is_idempotent_and_only_dirties_on_change() {
        let mut tree = FrameTree::new();
        let (root, _probe) = loaded_root(&mut tree);
        let a = tree.insert(PlainFrame);
        let b = tree.insert(PlainFrame);
        let c = tree.insert(PlainFrame);
        for f in [a, b, c] {
            tree.add_child(root, f).unwrap();
        }
        assert_eq!(tree.children_of(root), &[c, b, a]);

        clear_dirty(&tree);
        assert!(tree.bring_to_front(root, c));
        assert!(!tree.needs_redraw(root), "already in front");
        assert!(tree.send_to_back(root, a));
        assert!(!tree.needs_redraw(root), "already at back");

        assert!(tree.bring_to_front(root, a));
        assert_eq!(tree.children_of(root), &[a, c, b]);
        assert!(tree.needs_redraw(root));

        clear_dirty(&tree);
        assert!(tree.send_to_back(root, c));
        assert_eq!(tree.children_of(root), &[a, b, c]);
        assert!(tree.needs_redraw(root));

        let stranger = tree.insert(PlainFrame);
        assert!(!tree.bring_to_front(root, stranger));
    }

    #[test]
    fn lifecycle_hooks_follow_attachment() {
        let notes = journal();
        let mut tree = FrameTree::new();
        let root = tree.insert(Probe::new("root", &notes));
        let a = tree.insert(Probe::new("a", &notes));
        let b = tree.insert(Probe::new("b", &notes));
        tree.add_child(a, b).unwrap();
        assert!(notes.borrow().is_empty(), "detached frames get no hooks");

        let (screen, _probe) = MockScreen::new(100.0, 100.0);
        tree.attach_screen(root, screen, Size::new(100.0, 100.0))
            .unwrap();
        tree.add_child(root, a).unwrap();
        assert!(tree.is_loaded(a) && tree.is_loaded(b));

        tree.update(root, &tick(7));
        assert!(tree.remove_from_parent(a));
        assert!(!tree.is_loaded(a) && !tree.is_loaded(b));

        let loads: Vec<_> = notes
            .borrow()
            .iter()
            .filter(|n| matches!(n, Note::Loaded(_) | Note::Unloaded(_) | Note::Updated(..)))
            .cloned()
            .collect();
        assert_eq!(
            loads,
            vec![
                Note::Loaded("root"),
                Note::Loaded("a"),
                Note::Loaded("b"),
                Note::Updated("root", 7),
                Note::Updated("a", 7),
                Note::Updated("b", 7),
                Note::Unloaded("b"),
                Note::Unloaded("a"),
            ]
        );
    }

    #[test]
    fn detaching_releases_only_that_frames_claims() {
        let notes = journal();
        let mut tree = FrameTree::new();
        let (root, _probe) = loaded_root(&mut tree);
        let a = tree.insert(Probe::new("a", &notes));
        let b = tree.insert(Probe::new("b", &notes));
        tree.add_child(root, a).unwrap();
        tree.add_child(root, b).unwrap();

        assert!(tree.capture_mouse(a, 0));
        assert!(tree.capture_mouse(b, 1));
        assert!(tree.capture_keyboard(a, 5));
        tree.screen_mut()
            .unwrap()
            .claims_mut()
            .set_hover_frame(2, Some(a));

        assert!(tree.remove_child(root, a));
        let claims = tree.screen().unwrap().claims();
        assert_eq!(claims.focus_frame(0), None);
        assert_eq!(claims.key_frame(5), None);
        assert_eq!(claims.hover_frame(2), None);
        assert_eq!(claims.focus_frame(1), Some(b));
        assert!(!claims.is_claimed_by(a));

        let released: Vec<_> = notes
            .borrow()
            .iter()
            .filter(|n| matches!(n, Note::MouseReleased(..) | Note::KeyboardReleased(..)))
            .cloned()
            .collect();
        assert_eq!(
            released,
            vec![Note::MouseReleased("a", 0), Note::KeyboardReleased("a", 5)]
        );
    }

    #[test]
    fn content_scale_within_epsilon_is_not_a_change() {
        let mut tree = FrameTree::new();
        let (root, _probe) = loaded_root(&mut tree);
        let a = tree.insert(PlainFrame);
        tree.add_child(root, a).unwrap();

        clear_dirty(&tree);
        tree.set_content_scale(a, Size::new(1.0, 1.0)).unwrap();
        assert!(!tree.needs_redraw(a));
        tree.set_content_scale(a, Size::new(1.0 + 1e-9, 1.0))
            .unwrap();
        assert!(!tree.needs_redraw(a));

        tree.set_content_scale(a, Size::new(2.0, 1.0)).unwrap();
        assert!(tree.needs_redraw(a));
        assert_eq!(tree.geometry(a).unwrap().content_scale(), Size::new(2.0, 1.0));
    }

    #[test]
    fn transform_change_dirties_parent_not_self() {
        let mut tree = FrameTree::new();
        let (root, _probe) = loaded_root(&mut tree);
        let a = tree.insert(PlainFrame);
        tree.add_child(root, a).unwrap();

        clear_dirty(&tree);
        tree.set_transform(a, Affine::translate((0.1, 0.0))).unwrap();
        assert!(tree.needs_redraw(root));
        assert!(!tree.needs_redraw(a), "pure translation keeps the resolution");

        clear_dirty(&tree);
        tree.set_transform(a, Affine::translate((0.1, 0.0))).unwrap();
        assert!(!tree.needs_redraw(root), "unchanged transform");
    }

    #[test]
    fn root_policy_is_enforced() {
        let mut tree = FrameTree::new();
        let (root, _probe) = loaded_root(&mut tree);
        assert_eq!(
            tree.set_transform(root, Affine::scale(2.0)),
            Err(FrameError::RootPolicy("transform"))
        );
        assert_eq!(
            tree.set_color(root, Color::TRANSPARENT),
            Err(FrameError::RootPolicy("color"))
        );
        assert_eq!(
            tree.set_hidden(root, true),
            Err(FrameError::RootPolicy("visibility"))
        );
        assert_eq!(
            tree.set_pixel_format(root, PixelFormat::Rgba16Float),
            Err(FrameError::RootPolicy("pixel format"))
        );
        assert_eq!(tree.transforms(root).unwrap().transform, Affine::IDENTITY);
        assert!(!tree.is_hidden(root));

        let other = tree.insert(PlainFrame);
        assert_eq!(tree.add_child(other, root), Err(FrameError::RootFrame(root)));
    }

    #[test]
    fn pixel_format_rejects_depth_formats() {
        let mut tree = FrameTree::new();
        let a = tree.insert(PlainFrame);
        assert_eq!(
            tree.set_pixel_format(a, PixelFormat::Depth32Float),
            Err(FrameError::UnsupportedPixelFormat(PixelFormat::Depth32Float))
        );
        assert_eq!(tree.pixel_format(a), Some(PixelFormat::Rgba8Unorm));
        tree.set_pixel_format(a, PixelFormat::Bgra8UnormSrgb)
            .unwrap();
        assert_eq!(tree.pixel_format(a), Some(PixelFormat::Bgra8UnormSrgb));
    }

    #[test]
    fn remove_frees_subtree_and_bumps_generation() {
        let mut tree = FrameTree::new();
        let a = tree.insert(PlainFrame);
        let b = tree.insert(PlainFrame);
        let c = tree.insert(PlainFrame);
        tree.add_child(a, b).unwrap();
        tree.add_child(b, c).unwrap();

        tree.remove(b);
        assert!(tree.is_alive(a));
        assert!(!tree.is_alive(b) && !tree.is_alive(c));
        assert!(tree.children_of(a).is_empty());

        let d = tree.insert(PlainFrame);
        assert!(d.idx() == b.idx() || d.idx() == c.idx());
        assert_ne!(d, b);
        assert_ne!(d, c);
        assert_eq!(tree.parent_of(b), None);
        assert_eq!(tree.set_transform(b, Affine::IDENTITY), Err(FrameError::StaleFrame(b)));
    }

    #[test]
    fn removing_loaded_frame_unloads_it_first() {
        let notes = journal();
        let mut tree = FrameTree::new();
        let (root, _probe) = loaded_root(&mut tree);
        let a = tree.insert(Probe::new("a", &notes));
        tree.add_child(root, a).unwrap();

        tree.remove(a);
        assert!(!tree.is_alive(a));
        assert!(tree.children_of(root).is_empty());
        assert!(notes.borrow().contains(&Note::Unloaded("a")));
    }

    #[test]
    fn transform_snapshot_restores_inverses() {
        let mut tree = FrameTree::new();
        let a = tree.insert(PlainFrame);
        tree.set_transform(a, Affine::rotate(0.4) * Affine::scale(3.0))
            .unwrap();
        tree.set_content_transform(a, Affine::translate((2.0, -1.0)))
            .unwrap();
        let saved = tree.transforms(a).unwrap();
        let before = tree.geometry(a).unwrap().clone();

        let b = tree.insert(PlainFrame);
        tree.restore_transforms(b, saved).unwrap();
        let after = tree.geometry(b).unwrap();
        assert_eq!(after.transform(), before.transform());
        assert_eq!(after.transform_inverse(), before.transform_inverse());
        assert_eq!(after.content_transform(), before.content_transform());
        assert_eq!(
            after.content_transform_inverse(),
            before.content_transform_inverse()
        );

        let singular = FrameTransforms {
            transform: Affine::scale_non_uniform(0.0, 1.0),
            content_transform: Affine::scale_non_uniform(1.0, 0.0),
        };
        tree.restore_transforms(b, singular).unwrap();
        let g = tree.geometry(b).unwrap();
        assert_eq!(g.transform(), Affine::IDENTITY);
        assert_eq!(g.transform_inverse(), Affine::IDENTITY);
        assert_eq!(g.content_transform(), Affine::IDENTITY);
        assert_eq!(g.content_transform_inverse(), Affine::IDENTITY);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn transform_snapshot_serde_round_trip() {
        let saved = FrameTransforms {
            transform: Affine::translate((4.0, 2.0)) * Affine::scale(0.25),
            content_transform: Affine::rotate(1.0),
        };
        let json = serde_json::to_string(&saved).unwrap();
        let back: FrameTransforms = serde_json::from_str(&json).unwrap();
        assert_eq!(back, saved);
    }

    #[test]
    fn root_relative_transforms_compose() {
        let mut tree = FrameTree::new();
        let r = tree.insert(PlainFrame);
        let a = tree.insert(PlainFrame);
        let b = tree.insert(PlainFrame);
        tree.add_child(r, a).unwrap();
        tree.add_child(a, b).unwrap();
        tree.set_content_scale(r, Size::new(200.0, 100.0)).unwrap();
        tree.set_transform(a, Affine::translate((50.0, 0.0)) * Affine::scale(100.0))
            .unwrap();
        tree.set_content_scale(a, Size::new(10.0, 10.0)).unwrap();
        tree.set_transform(b, Affine::translate((5.0, 5.0)) * Affine::scale(5.0))
            .unwrap();
        tree.set_content_scale(b, Size::new(2.0, 2.0)).unwrap();

        // b's local (1,1) is its normalized (0.5,0.5), a's local (7.5,7.5),
        // a's normalized (0.75,0.75), and the root's (125,75).
        let p = tree.local_to_root(b, Point::new(1.0, 1.0)).unwrap();
        assert!((p - Point::new(125.0, 75.0)).hypot() < 1e-9);
        let back = tree.root_to_local(b, p).unwrap();
        assert!((back - Point::new(1.0, 1.0)).hypot() < 1e-9);
        assert_eq!(tree.local_to_root_transform(r), Some(Affine::IDENTITY));
    }

    #[test]
    fn stale_queries_are_empty() {
        let mut tree = FrameTree::new();
        let a = tree.insert(PlainFrame);
        tree.remove(a);
        assert!(tree.children_of(a).is_empty());
        assert_eq!(tree.geometry(a), None);
        assert_eq!(tree.local_to_root_transform(a), None);
        assert_eq!(tree.number_of_descendants(a), 0);
        assert!(!tree.remove_from_parent(a));
    }

    /// Destroys its own frame while being unloaded.
    struct SelfDestruct;

    impl FrameBehavior for SelfDestruct {
        fn on_unload(&mut self, cx: &mut FrameCx<'_>) {
            let id = cx.id();
            cx.tree_mut().remove(id);
        }
    }

    #[test]
    fn unload_hook_may_destroy_its_own_frame() {
        let mut tree = FrameTree::new();
        let (root, _probe) = loaded_root(&mut tree);
        let a = tree.insert(SelfDestruct);
        let c = tree.insert(PlainFrame);
        tree.add_child(a, c).unwrap();
        tree.add_child(root, a).unwrap();

        tree.remove(a);
        assert!(!tree.is_alive(a));
        assert!(!tree.is_alive(c));
        assert!(tree.children_of(root).is_empty());

        // Same hook firing from a screen detach.
        let b = tree.insert(SelfDestruct);
        tree.add_child(root, b).unwrap();
        assert!(tree.detach_screen().is_some());
        assert!(!tree.is_alive(b));
        assert!(tree.children_of(root).is_empty());
        assert!(!tree.is_loaded(root));
    }

    /// Detaches itself the first time it is loaded.
    struct Runaway {
        fled: bool,
    }

    impl FrameBehavior for Runaway {
        fn on_loaded(&mut self, cx: &mut FrameCx<'_>) {
            if !self.fled {
                self.fled = true;
                let id = cx.id();
                cx.tree_mut().remove_from_parent(id);
            }
        }
    }

    #[test]
    fn frame_detached_by_its_load_hook_stays_unloaded() {
        let mut tree = FrameTree::new();
        let (root, _probe) = loaded_root(&mut tree);
        let a = tree.insert(Runaway { fled: false });
        let k = tree.insert(PlainFrame);
        tree.add_child(a, k).unwrap();

        tree.add_child(root, a).unwrap();
        assert_eq!(tree.parent_of(a), None);
        assert!(!tree.is_loaded(a));
        assert!(!tree.is_loaded(k));
        assert!(tree.children_of(root).is_empty());

        tree.add_child(root, a).unwrap();
        assert!(tree.is_loaded(a), "a second attach loads normally");
        assert!(tree.is_loaded(k));
    }

    /// Destroys `victim` on its first update.
    struct Pruner {
        victim: Option<FrameId>,
    }

    impl FrameBehavior for Pruner {
        fn on_update(&mut self, cx: &mut FrameCx<'_>, _tick: &UpdateTick) {
            if let Some(victim) = self.victim.take() {
                cx.tree_mut().remove(victim);
            }
        }
    }

    #[test]
    fn update_hook_may_remove_a_later_sibling() {
        let notes = journal();
        let mut tree = FrameTree::new();
        let (root, _probe) = loaded_root(&mut tree);
        let b = tree.insert(Probe::new("b", &notes));
        let a = tree.insert(Pruner { victim: Some(b) });
        tree.add_child(root, b).unwrap();
        tree.add_child(root, a).unwrap();
        assert_eq!(tree.children_of(root), &[a, b]);
        notes.borrow_mut().clear();

        tree.update(root, &tick(1));
        assert!(!tree.is_alive(b));
        assert_eq!(tree.children_of(root), &[a]);
        assert_eq!(notes.borrow().as_slice(), &[Note::Unloaded("b")]);
    }

    /// Gives its frame a journaling child when loaded.
    struct Spawner {
        journal: Journal,
        spawned: Rc<Cell<Option<FrameId>>>,
    }

    impl FrameBehavior for Spawner {
        fn on_loaded(&mut self, cx: &mut FrameCx<'_>) {
            let id = cx.id();
            let tree = cx.tree_mut();
            let child = tree.insert(Probe::new("spawned", &self.journal));
            tree.add_child(id, child).unwrap();
            self.spawned.set(Some(child));
        }
    }

    #[test]
    fn load_hook_may_add_children() {
        let notes = journal();
        let spawned = Rc::new(Cell::new(None));
        let mut tree = FrameTree::new();
        let (root, _probe) = loaded_root(&mut tree);
        let s = tree.insert(Spawner {
            journal: notes.clone(),
            spawned: spawned.clone(),
        });
        tree.add_child(root, s).unwrap();

        let child = spawned.get().unwrap();
        assert_eq!(tree.parent_of(child), Some(s));
        assert!(tree.is_loaded(child));
        assert_eq!(
            notes.borrow().as_slice(),
            &[Note::Loaded("spawned"), Note::Resized("spawned")]
        );
    }

    #[test]
    fn singular_transform_on_identity_frame_is_not_a_change() {
        let mut tree = FrameTree::new();
        let (root, _probe) = loaded_root(&mut tree);
        let a = tree.insert(PlainFrame);
        tree.add_child(root, a).unwrap();

        clear_dirty(&tree);
        tree.set_transform(a, Affine::scale(0.0)).unwrap();
        assert!(!tree.needs_redraw(root));
        assert_eq!(tree.geometry(a).unwrap().transform(), Affine::IDENTITY);
    }
}
