use std::time::{Duration, Instant};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FactorSection {
    BuildSimple,
    BuildKernel,
    BuildFinish,
    FtranLower,
    FtranUpper,
    FtranUpdate,
    BtranUpper,
    BtranLower,
    BtranUpdate,
    Update,
}

#[derive(Debug, Default, Clone)]
pub struct FactorTimers {
    pub build_simple: Duration,
    pub build_kernel: Duration,
    pub build_finish: Duration,
    pub ftran_lower: Duration,
    pub ftran_upper: Duration,
    pub ftran_update: Duration,
    pub btran_upper: Duration,
    pub btran_lower: Duration,
    pub btran_update: Duration,
    pub update: Duration,
}

impl FactorTimers {
    pub fn scoped<'a>(&'a mut self, section: FactorSection) -> FactorGuard<'a> {
        FactorGuard { section, start: Instant::now(), timers: self }
    }

    pub fn add(&mut self, section: FactorSection, dt: Duration) {
        match section {
            FactorSection::BuildSimple => self.build_simple += dt,
            FactorSection::BuildKernel => self.build_kernel += dt,
            FactorSection::BuildFinish => self.build_finish += dt,
            FactorSection::FtranLower => self.ftran_lower += dt,
            FactorSection::FtranUpper => self.ftran_upper += dt,
            FactorSection::FtranUpdate => self.ftran_update += dt,
            FactorSection::BtranUpper => self.btran_upper += dt,
            FactorSection::BtranLower => self.btran_lower += dt,
            FactorSection::BtranUpdate => self.btran_update += dt,
            FactorSection::Update => self.update += dt,
        }
    }

    pub fn build_total(&self) -> Duration {
        self.build_simple + self.build_kernel + self.build_finish
    }

    pub fn ftran_total(&self) -> Duration {
        self.ftran_lower + self.ftran_upper + self.ftran_update
    }

    pub fn btran_total(&self) -> Duration {
        self.btran_upper + self.btran_lower + self.btran_update
    }

    /// Accumulate another set of timers into this one.
    pub fn merge(&mut self, other: &FactorTimers) {
        self.build_simple += other.build_simple;
        self.build_kernel += other.build_kernel;
        self.build_finish += other.build_finish;
        self.ftran_lower += other.ftran_lower;
        self.ftran_upper += other.ftran_upper;
        self.ftran_update += other.ftran_update;
        self.btran_upper += other.btran_upper;
        self.btran_lower += other.btran_lower;
        self.btran_update += other.btran_update;
        self.update += other.update;
    }
}

pub struct FactorGuard<'a> {
    section: FactorSection,
    start: Instant,
    timers: &'a mut FactorTimers,
}

impl Drop for FactorGuard<'_> {
    fn drop(&mut self) {
        self.timers.add(self.section, self.start.elapsed());
    }
}
