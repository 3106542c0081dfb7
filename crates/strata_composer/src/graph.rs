//! Composer graph
//!
//! Composers form a directed acyclic graph. A frame renders from the root:
//! each composer is bound, renders (deciding itself when and how often its
//! children render), and is unbound. The first failure aborts the rest of the
//! frame; composers that were rendering are put back untouched and the next
//! frame starts from a clean context.

use crate::context::RenderContext;
use strata_core::{Error, Handle, HandleMap, ObjectId, Result};

/// Handle to a composer in a graph
pub type ComposerId = Handle<ComposerEntry>;

/// Capability set of one composer kind
pub trait Composer: Send {
    /// Kind name, as used in authored composer descriptions
    fn kind(&self) -> &str;

    /// Acquire per-frame state, such as an owned render target
    fn bind(&mut self, ctx: &mut RenderContext<'_>, object: ObjectId) -> Result<()> {
        let _ = (ctx, object);
        Ok(())
    }

    /// Issue this composer's work; children render only when asked through
    /// `children`
    fn render(
        &mut self,
        ctx: &mut RenderContext<'_>,
        object: ObjectId,
        children: &mut dyn ChildComposers,
    ) -> Result<()>;

    /// Release what `bind` acquired
    fn unbind(&mut self, ctx: &mut RenderContext<'_>, object: ObjectId) -> Result<()> {
        let _ = (ctx, object);
        Ok(())
    }

    /// Forget state kept across frames
    fn invalidate(&mut self) {}
}

/// Children of the composer being rendered
pub trait ChildComposers {
    fn count(&self) -> usize;

    /// Render one child (bind, render, unbind)
    fn render_child(&mut self, index: usize, ctx: &mut RenderContext<'_>) -> Result<()>;

    /// Render every child in order
    fn render_all(&mut self, ctx: &mut RenderContext<'_>) -> Result<()> {
        for index in 0..self.count() {
            self.render_child(index, ctx)?;
        }
        Ok(())
    }
}

/// A composer plus its graph edges
pub struct ComposerEntry {
    name: String,
    object: ObjectId,
    composer: Option<Box<dyn Composer>>,
    children: Vec<ComposerId>,
}

impl ComposerEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owner of the composer's property cells
    pub fn object(&self) -> ObjectId {
        self.object
    }

    pub fn children(&self) -> &[ComposerId] {
        &self.children
    }

    pub fn kind(&self) -> Option<&str> {
        self.composer.as_deref().map(Composer::kind)
    }
}

/// Outcome of a rendered frame
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub composers_rendered: usize,
    pub composers_skipped: usize,
}

/// Render-pass graph
#[derive(Default)]
pub struct ComposerGraph {
    entries: HandleMap<ComposerEntry>,
    root: Option<ComposerId>,
}

impl ComposerGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a composer; `object` owns its property cells
    pub fn add(
        &mut self,
        name: impl Into<String>,
        object: ObjectId,
        composer: Box<dyn Composer>,
    ) -> ComposerId {
        self.entries.insert(ComposerEntry {
            name: name.into(),
            object,
            composer: Some(composer),
            children: Vec::new(),
        })
    }

    fn entry(&self, id: ComposerId) -> Result<&ComposerEntry> {
        self.entries
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("composer {}", id)))
    }

    pub fn get(&self, id: ComposerId) -> Option<&ComposerEntry> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Property owners of every composer in the graph
    pub fn objects(&self) -> Vec<ObjectId> {
        self.entries.iter().map(|(_, entry)| entry.object).collect()
    }

    pub fn find_by_name(&self, name: &str) -> Option<ComposerId> {
        self.entries
            .iter()
            .find(|(_, entry)| entry.name == name)
            .map(|(id, _)| id)
    }

    /// Remove a composer and every edge pointing at it. Its children stay in
    /// the graph.
    pub fn remove(&mut self, id: ComposerId) -> Result<Box<dyn Composer>> {
        let entry = self
            .entries
            .remove(id)
            .ok_or_else(|| Error::NotFound(format!("composer {}", id)))?;
        for handle in self.entries.handles() {
            if let Some(parent) = self.entries.get_mut(handle) {
                parent.children.retain(|&child| child != id);
            }
        }
        if self.root == Some(id) {
            self.root = None;
        }
        entry
            .composer
            .ok_or_else(|| Error::NotFound(format!("composer {} is rendering", id)))
    }

    fn reaches(&self, from: ComposerId, target: ComposerId) -> bool {
        let mut stack = vec![from];
        let mut seen = Vec::new();
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if seen.contains(&id) {
                continue;
            }
            seen.push(id);
            if let Some(entry) = self.entries.get(id) {
                stack.extend(entry.children.iter().copied());
            }
        }
        false
    }

    /// Append `child` to `parent`'s children. A composer may have several
    /// parents; an edge that would close a cycle fails with `Cycle`.
    pub fn attach_child(&mut self, parent: ComposerId, child: ComposerId) -> Result<()> {
        self.entry(parent)?;
        self.entry(child)?;
        if self.reaches(child, parent) {
            return Err(Error::Cycle(format!(
                "composer '{}' already renders '{}'",
                self.entry(child)?.name,
                self.entry(parent)?.name
            )));
        }
        if let Some(entry) = self.entries.get_mut(parent) {
            entry.children.push(child);
        }
        Ok(())
    }

    /// Remove one edge; returns whether it existed
    pub fn detach_child(&mut self, parent: ComposerId, child: ComposerId) -> bool {
        match self.entries.get_mut(parent) {
            Some(entry) => {
                let before = entry.children.len();
                entry.children.retain(|&c| c != child);
                entry.children.len() != before
            }
            None => false,
        }
    }

    pub fn set_root(&mut self, root: ComposerId) -> Result<()> {
        self.entry(root)?;
        self.root = Some(root);
        Ok(())
    }

    pub fn root(&self) -> Option<ComposerId> {
        self.root
    }

    /// Invalidate cross-frame state of every composer
    pub fn invalidate_all(&mut self) {
        for handle in self.entries.handles() {
            if let Some(composer) = self
                .entries
                .get_mut(handle)
                .and_then(|entry| entry.composer.as_mut())
            {
                composer.invalidate();
            }
        }
    }

    pub fn invalidate(&mut self, id: ComposerId) -> Result<()> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("composer {}", id)))?;
        if let Some(composer) = entry.composer.as_mut() {
            composer.invalidate();
        }
        Ok(())
    }

    /// Render one frame from the root. On failure the frame is abandoned and
    /// the error returned; the graph is left ready for the next frame.
    pub fn render_frame(&mut self, ctx: &mut RenderContext<'_>) -> Result<FrameStats> {
        let Some(root) = self.root else {
            return Ok(FrameStats::default());
        };
        let mut stats = FrameStats::default();
        match render_composer(&mut self.entries, root, ctx, &mut stats) {
            Ok(()) => Ok(stats),
            Err(e) => {
                log::error!("Frame {} aborted: {}", ctx.frame(), e);
                ctx.abort();
                Err(e)
            }
        }
    }
}

struct Children<'g> {
    entries: &'g mut HandleMap<ComposerEntry>,
    ids: Vec<ComposerId>,
    stats: &'g mut FrameStats,
}

impl ChildComposers for Children<'_> {
    fn count(&self) -> usize {
        self.ids.len()
    }

    fn render_child(&mut self, index: usize, ctx: &mut RenderContext<'_>) -> Result<()> {
        let id = *self
            .ids
            .get(index)
            .ok_or_else(|| Error::NotFound(format!("child composer #{}", index)))?;
        render_composer(self.entries, id, ctx, self.stats)
    }
}

fn render_composer(
    entries: &mut HandleMap<ComposerEntry>,
    id: ComposerId,
    ctx: &mut RenderContext<'_>,
    stats: &mut FrameStats,
) -> Result<()> {
    let entry = entries
        .get_mut(id)
        .ok_or_else(|| Error::NotFound(format!("composer {}", id)))?;
    let object = entry.object;
    let children = entry.children.clone();
    if !ctx.property::<bool>(object, ctx.ids().enabled)? {
        stats.composers_skipped += 1;
        return Ok(());
    }
    // Taken out while rendering so children can be borrowed from the same map
    let mut composer = entry
        .composer
        .take()
        .ok_or_else(|| Error::Cycle(format!("composer '{}' is already rendering", entry.name)))?;

    let result = run_composer(composer.as_mut(), object, children, entries, ctx, stats);

    if let Some(entry) = entries.get_mut(id) {
        entry.composer = Some(composer);
    }
    if result.is_ok() {
        stats.composers_rendered += 1;
    }
    result
}

fn run_composer(
    composer: &mut dyn Composer,
    object: ObjectId,
    children: Vec<ComposerId>,
    entries: &mut HandleMap<ComposerEntry>,
    ctx: &mut RenderContext<'_>,
    stats: &mut FrameStats,
) -> Result<()> {
    composer.bind(ctx, object)?;
    let mut nested = Children {
        entries,
        ids: children,
        stats,
    };
    composer.render(ctx, object, &mut nested)?;
    composer.unbind(ctx, object)
}
