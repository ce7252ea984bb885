//! The frame graph registration API.
//!
//! A [`FrameGraphBuilder`] collects pass registrations: each pass has a
//! queue class and a set of named subresource *roles* it reads or writes.
//! Roles describe requirements (format, state, access, stage, view usage)
//! and are bound to shared resource names; two roles bound to the same name
//! refer to the same physical resource. One shared name may be designated
//! as the swapchain backbuffer.
//!
//! [`FrameGraphBuilder::build`] then runs the whole construction pipeline
//! and returns the immutable [`FrameGraph`].
//!
//! The builder orders passes only through write→read dependencies. Two
//! passes that end up in the same dependency level while touching the same
//! subresource with conflicting states are a registration bug the builder
//! does not arbitrate; declare a write→read dependency between them
//! instead.

use std::collections::{HashMap, HashSet};

use anyhow::Result;

use crate::alloc::ImagePoolAllocator;
use crate::core::config::FrameGraphConfig;
use crate::core::error::Error;
use crate::domain::QueueClass;
use crate::graph::barrier::{self, CommonStatePolicy, TransitionPolicy};
use crate::graph::frame_graph::{self, FrameGraph};
use crate::graph::metadata::{
    BuildState, PassMetadata, ResourceKind, ResourceMetadata, Span, SubresourceNode,
    INVALID_INDEX, PRESENT_PASS_NAME,
};
use crate::graph::pass::PassExecutor;
use crate::graph::{dependency, lifetime, view};
use crate::resource::{AccessMask, Format, PipelineStageMask, ResourceState, ViewUsage};
use crate::submit::CommandRecorder;
use crate::swapchain::Swapchain;

pub(crate) type ExecutorFactory<R> = Box<dyn Fn(u32) -> Box<dyn PassExecutor<R> + Send>>;

#[derive(Debug, Default, Clone)]
struct RoleRegistration {
    read: bool,
    write: bool,
    shared_name: Option<String>,
    format: Format,
    state: ResourceState,
    access: AccessMask,
    stage: PipelineStageMask,
    usage: ViewUsage,
    auto_barrier: bool,
}

#[derive(Derivative)]
#[derivative(Debug)]
struct PassRegistration<R: CommandRecorder> {
    class: QueueClass,
    /// Role ids in registration order. Iteration never goes through the map
    /// directly so that rebuilding from the same description is
    /// deterministic.
    roles: Vec<String>,
    role_info: HashMap<String, RoleRegistration>,
    #[derivative(Debug = "ignore")]
    executor_factory: Option<ExecutorFactory<R>>,
}

/// Collects pass and subresource registrations and builds the frame graph.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct FrameGraphBuilder<R: CommandRecorder> {
    pass_names: Vec<String>,
    #[derivative(Debug = "ignore")]
    passes: HashMap<String, PassRegistration<R>>,
    backbuffer_name: Option<String>,
    per_frame_resources: HashSet<String>,
    #[derivative(Debug = "ignore")]
    policy: Box<dyn TransitionPolicy>,
}

impl<R: CommandRecorder> Default for FrameGraphBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRecorder> FrameGraphBuilder<R> {
    /// Create an empty builder using the default [`CommonStatePolicy`].
    pub fn new() -> Self {
        FrameGraphBuilder {
            pass_names: Vec::new(),
            passes: HashMap::new(),
            backbuffer_name: None,
            per_frame_resources: HashSet::new(),
            policy: Box::new(CommonStatePolicy),
        }
    }

    /// Replace the transition policy used for barrier synthesis.
    pub fn set_transition_policy(&mut self, policy: impl TransitionPolicy + 'static) {
        self.policy = Box::new(policy);
    }

    /// Register a pass under a unique name.
    /// # Errors
    /// * Fails if a pass with this name already exists.
    pub fn register_pass(&mut self, name: impl Into<String>, class: QueueClass) -> Result<()> {
        let name = name.into();
        if self.passes.contains_key(&name) {
            return Err(Error::DuplicatePass(name).into());
        }
        self.pass_names.push(name.clone());
        self.passes.insert(
            name,
            PassRegistration {
                class,
                roles: Vec::new(),
                role_info: HashMap::new(),
                executor_factory: None,
            },
        );
        Ok(())
    }

    /// Declare that a pass reads the given subresource role.
    pub fn register_read_subresource(&mut self, pass: &str, role: &str) -> Result<()> {
        self.register_subresource(pass, role, true, false)
    }

    /// Declare that a pass writes the given subresource role.
    pub fn register_write_subresource(&mut self, pass: &str, role: &str) -> Result<()> {
        self.register_subresource(pass, role, false, true)
    }

    fn register_subresource(&mut self, pass: &str, role: &str, read: bool, write: bool) -> Result<()> {
        let reg = self
            .passes
            .get_mut(pass)
            .ok_or_else(|| Error::PassNotFound(pass.to_string()))?;
        if let Some(info) = reg.role_info.get_mut(role) {
            if (read && info.read) || (write && info.write) {
                return Err(Error::DuplicateSubresource(pass.to_string(), role.to_string()).into());
            }
            info.read |= read;
            info.write |= write;
            return Ok(());
        }
        reg.roles.push(role.to_string());
        reg.role_info.insert(
            role.to_string(),
            RoleRegistration {
                read,
                write,
                ..Default::default()
            },
        );
        Ok(())
    }

    fn role_mut(&mut self, pass: &str, role: &str) -> Result<&mut RoleRegistration> {
        let reg = self
            .passes
            .get_mut(pass)
            .ok_or_else(|| Error::PassNotFound(pass.to_string()))?;
        Ok(reg
            .role_info
            .get_mut(role)
            .ok_or_else(|| Error::SubresourceNotFound(pass.to_string(), role.to_string()))?)
    }

    /// Set the element format a pass requires of a subresource. Roles with
    /// no format set inherit one from the other passes sharing the resource.
    pub fn set_subresource_format(&mut self, pass: &str, role: &str, format: Format) -> Result<()> {
        self.role_mut(pass, role)?.format = format;
        Ok(())
    }

    /// Set the resource state a pass requires of a subresource.
    pub fn set_subresource_state(&mut self, pass: &str, role: &str, state: ResourceState) -> Result<()> {
        self.role_mut(pass, role)?.state = state;
        Ok(())
    }

    /// Set the memory accesses a pass performs on a subresource.
    pub fn set_subresource_access(&mut self, pass: &str, role: &str, access: AccessMask) -> Result<()> {
        self.role_mut(pass, role)?.access = access;
        Ok(())
    }

    /// Set the pipeline stages in which a pass touches a subresource.
    pub fn set_subresource_stage(&mut self, pass: &str, role: &str, stage: PipelineStageMask) -> Result<()> {
        self.role_mut(pass, role)?.stage = stage;
        Ok(())
    }

    /// Set the view classes a pass needs of a subresource, on top of what
    /// its resource state already implies.
    pub fn set_subresource_usage(&mut self, pass: &str, role: &str, usage: ViewUsage) -> Result<()> {
        self.role_mut(pass, role)?.usage = usage;
        Ok(())
    }

    /// Declare that the pass performs its own synchronization for this
    /// subresource. Barrier synthesis will not emit before/after barriers
    /// for it.
    pub fn enable_auto_barrier(&mut self, pass: &str, role: &str) -> Result<()> {
        self.role_mut(pass, role)?.auto_barrier = true;
        Ok(())
    }

    /// Bind a subresource role to a shared resource name. Roles of
    /// different passes bound to the same name refer to the same physical
    /// resource.
    pub fn bind_subresource_name(&mut self, pass: &str, role: &str, shared: impl Into<String>) -> Result<()> {
        self.role_mut(pass, role)?.shared_name = Some(shared.into());
        Ok(())
    }

    /// Designate a shared resource name as the swapchain backbuffer. The
    /// graph creates a synthetic acquire/present pass for it and swaps its
    /// physical image in each frame instead of allocating one.
    pub fn bind_backbuffer_name(&mut self, shared: impl Into<String>) {
        self.backbuffer_name = Some(shared.into());
    }

    /// Mark a shared resource as ping-ponged across frames in flight: it
    /// gets one physical instance per in-flight frame so a new frame never
    /// overwrites a copy the GPU may still be reading.
    pub fn mark_resource_per_frame(&mut self, shared: impl Into<String>) {
        self.per_frame_resources.insert(shared.into());
    }

    /// Install the executor factory for a pass. The factory is invoked once
    /// per recorded copy at build time with the copy index; a pass cycling
    /// with the swapchain gets one call per swapchain image.
    pub fn set_pass_executor<F, E>(&mut self, pass: &str, factory: F) -> Result<()>
    where
        F: Fn(u32) -> E + 'static,
        E: PassExecutor<R> + Send + 'static,
    {
        let reg = self
            .passes
            .get_mut(pass)
            .ok_or_else(|| Error::PassNotFound(pass.to_string()))?;
        reg.executor_factory = Some(Box::new(move |copy| Box::new(factory(copy))));
        Ok(())
    }

    /// Install a recording closure shared by every copy of a pass. Shorthand
    /// for [`set_pass_executor`](Self::set_pass_executor) with a cloning
    /// factory.
    pub fn set_pass_record_fn<F>(&mut self, pass: &str, record: F) -> Result<()>
    where
        F: FnMut(&mut R, &crate::graph::pass::RecordContext) -> Result<()> + Clone + Send + 'static,
    {
        self.set_pass_executor(pass, move |_| record.clone())
    }

    /// Build the frame graph: order the passes into dependency levels,
    /// allocate and alias physical resources, deduplicate views, and
    /// synthesize the barrier list.
    ///
    /// # Errors
    /// * Fails on registration errors: unbound subresources, cyclic
    ///   dependencies, incompatible frame periods within one pass, an unused
    ///   backbuffer binding.
    /// * Fails if the injected allocator fails. Nothing is retried.
    /// * Fails if any payload is still unresolved when barrier synthesis
    ///   runs.
    pub fn build(
        self,
        config: FrameGraphConfig,
        swapchain: &dyn Swapchain,
        allocator: &mut dyn ImagePoolAllocator,
    ) -> Result<FrameGraph<R>> {
        let mut state = BuildState::new(config, swapchain);

        self.init_pass_list(&mut state);
        self.init_resource_list(&mut state)?;
        dependency::sort_passes(&mut state)?;
        lifetime::amplify(&mut state, &self.per_frame_resources)?;
        lifetime::propagate_payloads(&mut state)?;
        lifetime::create_images(&mut state, allocator)?;
        view::create_views(&mut state);
        barrier::mark_promotions(&mut state, &*self.policy);
        barrier::build_barriers(&mut state, &*self.policy);

        info!(
            "frame graph built: {} passes in {} dependency levels, {} resources, {} barriers",
            state.passes.len(),
            state.level_spans.len(),
            state.resources.len(),
            state.barriers.len()
        );

        let factories = self
            .passes
            .into_iter()
            .filter_map(|(name, reg)| reg.executor_factory.map(|f| (name, f)))
            .collect::<HashMap<_, _>>();
        Ok(frame_graph::assemble(state, factories))
    }

    /// Flatten registrations into the pass metadata and subresource node
    /// arenas, appending the present quasi-pass if a backbuffer is bound.
    fn init_pass_list(&self, state: &mut BuildState) {
        for name in &self.pass_names {
            let reg = &self.passes[name];
            let begin = state.nodes.len() as u32;
            for role in &reg.roles {
                let info = &reg.role_info[role];
                let mut node = SubresourceNode::new(reg.class.sync_class());
                node.read = info.read;
                node.write = info.write;
                node.payload.format = info.format;
                node.payload.state = info.state;
                node.payload.access = info.access;
                node.payload.stage = info.stage;
                node.payload.usage = info.usage;
                node.payload.auto_barrier = info.auto_barrier;
                state.nodes.push(node);
            }
            state.passes.push(PassMetadata {
                name: name.clone(),
                class: reg.class,
                dependency_level: 0,
                subresources: Span::new(begin, state.nodes.len() as u32),
                roles: reg.roles.clone(),
            });
        }
        state.render_span = Span::new(0, state.passes.len() as u32);

        if self.backbuffer_name.is_some() {
            let begin = state.nodes.len() as u32;
            let mut node = SubresourceNode::new(QueueClass::Graphics);
            node.read = true;
            node.write = true;
            node.payload.format = state.swapchain_format;
            node.payload.state = ResourceState::Present;
            node.payload.stage = PipelineStageMask::BOTTOM_OF_PIPE;
            state.nodes.push(node);
            state.passes.push(PassMetadata {
                name: PRESENT_PASS_NAME.to_string(),
                class: QueueClass::Present,
                dependency_level: 0,
                subresources: Span::new(begin, state.nodes.len() as u32),
                roles: vec!["backbuffer".to_string()],
            });
        }
        state.present_span = Span::new(state.render_span.end, state.passes.len() as u32);
    }

    /// Resolve shared names to resource metadata entries and point every
    /// node at its resource. Unbound roles are fatal here, before anything
    /// is allocated.
    fn init_resource_list(&self, state: &mut BuildState) -> Result<()> {
        let mut indices: HashMap<String, u32> = HashMap::new();

        if let Some(backbuffer) = &self.backbuffer_name {
            state.resources.push(ResourceMetadata {
                name: backbuffer.clone(),
                kind: ResourceKind::Backbuffer,
                head_node: INVALID_INDEX,
                frame_count: 1,
                image_index: INVALID_INDEX,
                description: None,
            });
            state.backbuffer_resource = Some(0);
            indices.insert(backbuffer.clone(), 0);
            // The present quasi-pass owns the last node in the arena.
            let present_node = state.nodes.len() - 1;
            state.nodes[present_node].resource_index = 0;
        }

        for (pass_index, name) in self.pass_names.iter().enumerate() {
            let reg = &self.passes[name];
            let span = state.passes[pass_index].subresources;
            for (slot, role) in reg.roles.iter().enumerate() {
                let info = &reg.role_info[role];
                let shared = info
                    .shared_name
                    .as_deref()
                    .ok_or_else(|| Error::UnboundSubresource(name.clone(), role.clone()))?;
                let resource_index = match indices.get(shared) {
                    Some(&index) => index,
                    None => {
                        let index = state.resources.len() as u32;
                        state.resources.push(ResourceMetadata {
                            name: shared.to_string(),
                            kind: ResourceKind::Texture,
                            head_node: INVALID_INDEX,
                            frame_count: 1,
                            image_index: INVALID_INDEX,
                            description: None,
                        });
                        indices.insert(shared.to_string(), index);
                        index
                    }
                };
                state.nodes[span.begin as usize + slot].resource_index = resource_index;
            }
        }

        if let Some(backbuffer) = &self.backbuffer_name {
            let used = state.passes[state.render_span.range()]
                .iter()
                .flat_map(|p| state.nodes[p.subresources.range()].iter())
                .any(|n| n.resource_index == 0);
            if !used {
                return Err(Error::BackbufferNotUsed(backbuffer.clone()).into());
            }
        }

        debug!(
            "registered {} passes using {} resources",
            state.passes.len(),
            state.resources.len()
        );
        Ok(())
    }
}
