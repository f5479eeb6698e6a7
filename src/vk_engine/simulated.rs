//! In-memory stand-in for the graphics/present queues and their sync objects.
//!
//! Models fence states, semaphore signal/consume pairs, swapchain image ownership and
//! in-order GPU completion. Anything the real driver would reject (or hang on) is
//! recorded in `violations` instead of panicking, so tests can assert on it.

use crate::vk_engine::frame_ring::FrameRing;
use crate::vk_engine::presentation::{AcquiredImage, PresentationDevice};
use crate::vk_types::EngineError;
use ash::vk;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FenceState {
    Signaled,
    Unsignaled,
    Pending(u64),
}

struct Submission {
    id: u64,
    image: u32,
    fence_slot: usize,
}

pub struct SimulatedDevice {
    slots: usize,
    images: u32,
    next_image: u32,
    slow_gpu: bool,
    suboptimal_from: Option<usize>,
    out_of_date_at: Option<usize>,
    acquires: usize,
    fences: Vec<FenceState>,
    waited_since_submit: Vec<bool>,
    image_available: Vec<bool>,
    render_finished: Vec<bool>,
    busy_images: Vec<bool>,
    in_flight: VecDeque<Submission>,
    next_submission: u64,
    blocked_acquires: usize,
    presented: Vec<u32>,
    violations: Vec<String>,
}

impl SimulatedDevice {
    /// `count` frame slots and as many swapchain images. Submissions finish as soon as
    /// they are queued unless [`with_slow_gpu`](Self::with_slow_gpu) is set.
    pub fn new(count: usize) -> Self {
        SimulatedDevice {
            slots: count,
            images: count as u32,
            next_image: 0,
            slow_gpu: false,
            suboptimal_from: None,
            out_of_date_at: None,
            acquires: 0,
            fences: vec![FenceState::Signaled; count],
            waited_since_submit: vec![false; count],
            image_available: vec![false; count],
            render_finished: vec![false; count],
            busy_images: vec![false; count],
            in_flight: VecDeque::new(),
            next_submission: 0,
            blocked_acquires: 0,
            presented: Vec::new(),
            violations: Vec::new(),
        }
    }

    /// Submissions only complete when a fence wait or a starved acquire forces them.
    pub fn with_slow_gpu(mut self) -> Self {
        self.slow_gpu = true;
        self
    }

    pub fn starting_at_image(mut self, image: u32) -> Self {
        self.next_image = image % self.images;
        self
    }

    /// Hands out images from a pool of `images` while keeping the slot count.
    pub fn reporting_image_count(mut self, images: u32) -> Self {
        self.images = images;
        self.busy_images = vec![false; images as usize];
        self
    }

    pub fn suboptimal_from(mut self, acquire: usize) -> Self {
        self.suboptimal_from = Some(acquire);
        self
    }

    pub fn out_of_date_at(mut self, acquire: usize) -> Self {
        self.out_of_date_at = Some(acquire);
        self
    }

    pub fn frame_ring(&self) -> FrameRing<usize> {
        FrameRing::new((0..self.slots).collect()).unwrap()
    }

    pub fn submissions(&self) -> u64 {
        self.next_submission
    }

    pub fn presented(&self) -> &[u32] {
        &self.presented
    }

    pub fn blocked_acquires(&self) -> usize {
        self.blocked_acquires
    }

    pub fn fence_signaled(&self, slot: usize) -> bool {
        self.fences[slot] == FenceState::Signaled
    }

    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    fn retire_oldest(&mut self) -> bool {
        let Some(submission) = self.in_flight.pop_front() else {
            return false;
        };
        if self.fences[submission.fence_slot] == FenceState::Pending(submission.id) {
            self.fences[submission.fence_slot] = FenceState::Signaled;
        }
        self.busy_images[submission.image as usize] = false;
        true
    }

    fn retire_through(&mut self, id: u64) {
        while self.in_flight.front().map_or(false, |s| s.id <= id) {
            self.retire_oldest();
        }
    }

    fn free_image(&self) -> Option<u32> {
        (0..self.images)
            .map(|offset| (self.next_image + offset) % self.images)
            .find(|&image| !self.busy_images[image as usize])
    }
}

impl PresentationDevice for SimulatedDevice {
    type FrameSync = usize;

    fn image_count(&self) -> u32 {
        self.images
    }

    fn wait_for_fence(&mut self, &slot: &usize) -> Result<(), EngineError> {
        if self.waited_since_submit[slot] {
            self.violations
                .push(format!("fence {slot} waited twice without a submission"));
        }
        match self.fences[slot] {
            FenceState::Signaled => {}
            FenceState::Pending(id) => self.retire_through(id),
            FenceState::Unsignaled => {
                // a real wait would never return
                return Err(EngineError::Vulkan {
                    context: "wait_for_fences",
                    result: vk::Result::TIMEOUT,
                });
            }
        }
        self.waited_since_submit[slot] = true;
        Ok(())
    }

    fn reset_fence(&mut self, &slot: &usize) -> Result<(), EngineError> {
        if let FenceState::Pending(_) = self.fences[slot] {
            self.violations
                .push(format!("fence {slot} reset while its submission is in flight"));
        }
        self.fences[slot] = FenceState::Unsignaled;
        Ok(())
    }

    fn acquire_next_image(&mut self, &slot: &usize) -> Result<AcquiredImage, EngineError> {
        let call = self.acquires;
        self.acquires += 1;
        if self.out_of_date_at == Some(call) {
            return Err(EngineError::SwapchainOutOfDate);
        }
        let image = loop {
            if let Some(image) = self.free_image() {
                break image;
            }
            // every image is in use: block until the oldest submission completes
            if !self.retire_oldest() {
                return Err(EngineError::Vulkan {
                    context: "acquire_next_image",
                    result: vk::Result::TIMEOUT,
                });
            }
            self.blocked_acquires += 1;
        };
        self.busy_images[image as usize] = true;
        self.next_image = (image + 1) % self.images;
        if self.image_available[slot] {
            self.violations
                .push(format!("image-available {slot} signaled twice"));
        }
        self.image_available[slot] = true;
        Ok(AcquiredImage {
            index: image,
            suboptimal: self.suboptimal_from.map_or(false, |from| call >= from),
        })
    }

    fn submit(
        &mut self,
        image_index: u32,
        &wait: &usize,
        &signal: &usize,
        &fence: &usize,
    ) -> Result<(), EngineError> {
        if !self.image_available[wait] {
            self.violations
                .push(format!("submit waits on unsignaled image-available {wait}"));
        }
        self.image_available[wait] = false;
        if !self.busy_images.get(image_index as usize).copied().unwrap_or(false) {
            self.violations
                .push(format!("submit renders image {image_index} that was not acquired"));
        }
        if self.fences[fence] != FenceState::Unsignaled {
            self.violations
                .push(format!("submit with fence {fence} that was not reset"));
        }
        if self.render_finished[signal] {
            self.violations
                .push(format!("render-finished {signal} signaled twice"));
        }
        self.render_finished[signal] = true;

        let id = self.next_submission;
        self.next_submission += 1;
        self.fences[fence] = FenceState::Pending(id);
        self.waited_since_submit[fence] = false;
        self.in_flight.push_back(Submission {
            id,
            image: image_index,
            fence_slot: fence,
        });
        if !self.slow_gpu {
            self.retire_through(id);
        }
        Ok(())
    }

    fn present(&mut self, image_index: u32, &wait: &usize) -> Result<bool, EngineError> {
        if !self.render_finished[wait] {
            self.violations.push(format!(
                "present of image {image_index} waits on unsignaled render-finished {wait}"
            ));
        }
        self.render_finished[wait] = false;
        self.presented.push(image_index);
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Blocking is the device's side of the acquire contract. PresentationCycle never
    // reaches it while frame slots equal images; see fence_wait_frees_an_image_before_acquire.
    #[test]
    fn acquire_blocks_until_oldest_completes_when_all_slots_in_flight() {
        let mut device = SimulatedDevice::new(3).with_slow_gpu();
        for slot in 0..3usize {
            device.wait_for_fence(&slot).unwrap();
            device.reset_fence(&slot).unwrap();
            let acquired = device.acquire_next_image(&slot).unwrap();
            assert_eq!(acquired.index, slot as u32);
            device.submit(acquired.index, &slot, &slot, &slot).unwrap();
            device.present(acquired.index, &slot).unwrap();
        }
        assert_eq!(device.blocked_acquires(), 0);
        assert!(!device.fence_signaled(0));

        let acquired = device.acquire_next_image(&0).unwrap();
        // images 1 and 2 are still being rendered
        assert_eq!(acquired.index, 0);
        assert_eq!(device.blocked_acquires(), 1);
        assert!(device.fence_signaled(0));
        assert!(!device.fence_signaled(1));
        assert!(device.violations().is_empty(), "{:?}", device.violations());
    }

    #[test]
    fn waiting_on_a_reset_fence_would_hang() {
        let mut device = SimulatedDevice::new(2);
        device.reset_fence(&0).unwrap();
        assert!(matches!(
            device.wait_for_fence(&0),
            Err(EngineError::Vulkan { result: vk::Result::TIMEOUT, .. })
        ));
    }

    #[test]
    fn double_wait_is_recorded() {
        let mut device = SimulatedDevice::new(2);
        device.wait_for_fence(&1).unwrap();
        device.wait_for_fence(&1).unwrap();
        assert_eq!(device.violations().len(), 1);
    }
}
