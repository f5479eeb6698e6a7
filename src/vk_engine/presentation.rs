use crate::vk_engine::frame_ring::FrameRing;
use crate::vk_types::EngineError;

/// Which render-finished semaphore the submit signals and the present waits on.
///
/// The recorded renderer signals by acquired image but waits by frame slot. The two
/// only line up while the swapchain hands images back in slot order, so this is
/// kept selectable instead of silently picking one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderFinishedIndexing {
    /// signal `render_finished[image_index]`, wait on `render_finished[current_frame]`
    AsRecorded,
    /// signal and wait on `render_finished[image_index]`
    PerImage,
    /// signal and wait on `render_finished[current_frame]`
    PerFrame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquiredImage {
    pub index: u32,
    pub suboptimal: bool,
}

/// The queue, swapchain and sync primitives the presentation cycle drives.
///
/// `FrameSync` is whatever one frame slot owns (a fence plus image-available and
/// render-finished semaphores); each call picks the object it needs out of it.
pub trait PresentationDevice {
    type FrameSync;

    fn image_count(&self) -> u32;

    /// Blocks until the slot's fence is signaled. No timeout.
    fn wait_for_fence(&mut self, frame: &Self::FrameSync) -> Result<(), EngineError>;

    fn reset_fence(&mut self, frame: &Self::FrameSync) -> Result<(), EngineError>;

    /// Acquires the next presentable image, signaling `frame`'s image-available semaphore.
    fn acquire_next_image(&mut self, frame: &Self::FrameSync)
        -> Result<AcquiredImage, EngineError>;

    /// Submits the prerecorded commands for `image_index`.
    fn submit(
        &mut self,
        image_index: u32,
        wait_image_available: &Self::FrameSync,
        signal_render_finished: &Self::FrameSync,
        fence: &Self::FrameSync,
    ) -> Result<(), EngineError>;

    /// Queues `image_index` for presentation. Returns true if the swapchain is suboptimal.
    fn present(
        &mut self,
        image_index: u32,
        wait_render_finished: &Self::FrameSync,
    ) -> Result<bool, EngineError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    WaitFence,
    Acquire,
    Submit { image_index: u32 },
    Present { image_index: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub frame_slot: usize,
    pub image_index: u32,
    pub suboptimal: bool,
}

pub struct PresentationCycle<S> {
    frames: FrameRing<S>,
    image_count: u32,
    state: CycleState,
    indexing: RenderFinishedIndexing,
    suboptimal: bool,
    suboptimal_reported: bool,
    divergence_reported: bool,
    completed: u64,
}

impl<S> PresentationCycle<S> {
    /// One frame slot per swapchain image; semaphores get indexed by image as well as by slot.
    pub fn new(
        frames: FrameRing<S>,
        image_count: u32,
        indexing: RenderFinishedIndexing,
    ) -> Result<Self, EngineError> {
        if frames.capacity() != image_count as usize {
            return Err(EngineError::FrameCountMismatch {
                frames: frames.capacity(),
                images: image_count,
            });
        }
        Ok(PresentationCycle {
            frames,
            image_count,
            state: CycleState::Idle,
            indexing,
            suboptimal: false,
            suboptimal_reported: false,
            divergence_reported: false,
            completed: 0,
        })
    }

    #[cfg(test)]
    pub fn state(&self) -> CycleState {
        self.state
    }

    #[cfg(test)]
    pub fn current_frame(&self) -> usize {
        self.frames.current_slot()
    }

    #[cfg(test)]
    pub fn completed_cycles(&self) -> u64 {
        self.completed
    }

    pub fn frames(&self) -> &FrameRing<S> {
        &self.frames
    }

    /// Runs the action attached to the current state and moves to the next one.
    pub fn step<D>(&mut self, device: &mut D) -> Result<CycleState, EngineError>
    where
        D: PresentationDevice<FrameSync = S>,
    {
        let next = match self.state {
            CycleState::Idle => {
                self.suboptimal = false;
                CycleState::WaitFence
            }
            CycleState::WaitFence => {
                let frame = self.frames.current();
                device.wait_for_fence(frame)?;
                device.reset_fence(frame)?;
                CycleState::Acquire
            }
            CycleState::Acquire => {
                let acquired = device.acquire_next_image(self.frames.current())?;
                if acquired.index >= self.image_count {
                    return Err(EngineError::ImageIndexOutOfRange {
                        index: acquired.index,
                        image_count: self.image_count,
                    });
                }
                self.note_suboptimal(acquired.suboptimal);
                CycleState::Submit {
                    image_index: acquired.index,
                }
            }
            CycleState::Submit { image_index } => {
                let current = self.frames.current();
                let signal = match self.indexing {
                    RenderFinishedIndexing::AsRecorded | RenderFinishedIndexing::PerImage => {
                        self.frame_for_image(image_index)?
                    }
                    RenderFinishedIndexing::PerFrame => current,
                };
                device.submit(image_index, current, signal, current)?;
                CycleState::Present { image_index }
            }
            CycleState::Present { image_index } => {
                let current_slot = self.frames.current_slot();
                let wait = match self.indexing {
                    RenderFinishedIndexing::AsRecorded => {
                        if image_index as usize != current_slot && !self.divergence_reported {
                            log::warn!(
                                "image {image_index} acquired in frame slot {current_slot}: \
                                 present waits on a render-finished semaphore the submit did not signal"
                            );
                            self.divergence_reported = true;
                        }
                        self.frames.current()
                    }
                    RenderFinishedIndexing::PerImage => self.frame_for_image(image_index)?,
                    RenderFinishedIndexing::PerFrame => self.frames.current(),
                };
                let suboptimal = device.present(image_index, wait)?;
                self.note_suboptimal(suboptimal);
                self.frames.advance();
                self.completed += 1;
                CycleState::Idle
            }
        };
        log::trace!("{:?} -> {:?}", self.state, next);
        self.state = next;
        Ok(next)
    }

    /// Drives one full `Idle -> ... -> Idle` pass.
    pub fn run_cycle<D>(&mut self, device: &mut D) -> Result<CycleReport, EngineError>
    where
        D: PresentationDevice<FrameSync = S>,
    {
        let frame_slot = self.frames.current_slot();
        let mut image_index = 0;
        loop {
            match self.step(device)? {
                CycleState::Idle => break,
                CycleState::Submit { image_index: index } => image_index = index,
                _ => {}
            }
        }
        Ok(CycleReport {
            frame_slot,
            image_index,
            suboptimal: self.suboptimal,
        })
    }

    fn frame_for_image(&self, image_index: u32) -> Result<&S, EngineError> {
        self.frames
            .get(image_index as usize)
            .ok_or(EngineError::ImageIndexOutOfRange {
                index: image_index,
                image_count: self.image_count,
            })
    }

    fn note_suboptimal(&mut self, suboptimal: bool) {
        if !suboptimal {
            return;
        }
        self.suboptimal = true;
        if !self.suboptimal_reported {
            log::warn!("swapchain is suboptimal for the surface, continuing without recreation");
            self.suboptimal_reported = true;
        }
    }
}
