use serde::{Deserialize, Serialize};

use crate::properties::{LocalState, NondimensionalGroups, Properties};
use crate::uncertain::Uncertain;

/// Straight-line least-squares estimate `y = a + b x`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinearFit {
    pub a: f64,
    pub sig_a: f64,
    pub b: f64,
    pub sig_b: f64,
}

impl LinearFit {
    /// The slope as an uncertain value.
    pub fn slope(&self) -> Uncertain {
        Uncertain::new(self.b, self.sig_b)
    }

    /// `sig_b / |b|`, infinite for a flat line.
    pub fn relative_slope_error(&self) -> f64 {
        self.sig_b / self.b.abs()
    }
}

/// A fit together with its goodness-of-fit statistics.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EvaluatedFit {
    pub fit: LinearFit,
    pub r2: f64,
    /// Probability of a χ² at least this large arising by chance.
    pub q: f64,
    pub chi2: f64,
    pub nu_chi: usize,
}

/// Everything recorded about the accepted fit of one target.
#[derive(Clone, Debug, PartialEq)]
pub struct FitRecord {
    pub experiment_id: u64,
    /// Centre of the regression window.
    pub idx: u64,
    pub target_rh: f64,
    pub evaluated: EvaluatedFit,
    pub state: LocalState,
    pub properties: Properties,
    pub groups: NondimensionalGroups,
}

/// Flat form of a [`FitRecord`], one nominal and one `sig_` column per uncertain quantity.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct FitRow {
    pub experiment_id: u64,
    pub idx: u64,
    pub target_rh: f64,
    pub a: f64,
    pub sig_a: f64,
    pub b: f64,
    pub sig_b: f64,
    pub r2: f64,
    pub q: f64,
    pub chi2: f64,
    pub nu_chi: usize,
    pub ts: f64,
    pub sig_ts: f64,
    pub te: f64,
    pub sig_te: f64,
    pub tdp: f64,
    pub sig_tdp: f64,
    pub p: f64,
    pub sig_p: f64,
    pub mddp: f64,
    pub sig_mddp: f64,
    pub x1s: f64,
    pub sig_x1s: f64,
    pub x1e: f64,
    pub sig_x1e: f64,
    pub x1: f64,
    pub sig_x1: f64,
    pub m1s: f64,
    pub sig_m1s: f64,
    pub m1e: f64,
    pub sig_m1e: f64,
    pub m1: f64,
    pub sig_m1: f64,
    pub rhos: f64,
    pub sig_rhos: f64,
    pub rhoe: f64,
    pub sig_rhoe: f64,
    pub rho: f64,
    pub sig_rho: f64,
    pub bm1: f64,
    pub sig_bm1: f64,
    pub t: f64,
    pub sig_t: f64,
    pub d12: f64,
    pub sig_d12: f64,
    pub hfg: f64,
    pub sig_hfg: f64,
    pub hu: f64,
    pub sig_hu: f64,
    pub hs: f64,
    pub sig_hs: f64,
    pub cpv: f64,
    pub sig_cpv: f64,
    pub he: f64,
    pub sig_he: f64,
    pub cpl: f64,
    pub sig_cpl: f64,
    pub ht: f64,
    pub sig_ht: f64,
    pub qcu: f64,
    pub sig_qcu: f64,
    pub ebe: f64,
    pub sig_ebe: f64,
    pub ebs: f64,
    pub sig_ebs: f64,
    pub qrs: f64,
    pub sig_qrs: f64,
    pub kv: f64,
    pub sig_kv: f64,
    pub alpha: f64,
    pub sig_alpha: f64,
    pub bh: f64,
    pub sig_bh: f64,
    pub m: f64,
    pub sig_m: f64,
    pub gamma1: f64,
    pub sig_gamma1: f64,
    pub gamma2: f64,
    pub sig_gamma2: f64,
    pub beta: f64,
    pub sig_beta: f64,
    pub delta_m: f64,
    pub sig_delta_m: f64,
    pub delta_t: f64,
    pub sig_delta_t: f64,
    pub mu: f64,
    pub sig_mu: f64,
    pub nu: f64,
    pub sig_nu: f64,
    pub sh_r: f64,
    pub sig_sh_r: f64,
    pub nu_r: f64,
    pub sig_nu_r: f64,
    pub le: f64,
    pub sig_le: f64,
    pub gr_r_binary: f64,
    pub sig_gr_r_binary: f64,
    pub gr_r_primary: f64,
    pub sig_gr_r_primary: f64,
}

impl From<&FitRecord> for FitRow {
    fn from(record: &FitRecord) -> Self {
        let fit = record.evaluated.fit;
        let state = &record.state;
        let props = &record.properties;
        let groups = &record.groups;
        Self {
            experiment_id: record.experiment_id,
            idx: record.idx,
            target_rh: record.target_rh,
            a: fit.a,
            sig_a: fit.sig_a,
            b: fit.b,
            sig_b: fit.sig_b,
            r2: record.evaluated.r2,
            q: record.evaluated.q,
            chi2: record.evaluated.chi2,
            nu_chi: record.evaluated.nu_chi,
            ts: state.ts.value(),
            sig_ts: state.ts.std_dev(),
            te: state.te.value(),
            sig_te: state.te.std_dev(),
            tdp: state.tdp.value(),
            sig_tdp: state.tdp.std_dev(),
            p: state.p.value(),
            sig_p: state.p.std_dev(),
            mddp: props.mddp.value(),
            sig_mddp: props.mddp.std_dev(),
            x1s: props.x1s.value(),
            sig_x1s: props.x1s.std_dev(),
            x1e: props.x1e.value(),
            sig_x1e: props.x1e.std_dev(),
            x1: props.x1.value(),
            sig_x1: props.x1.std_dev(),
            m1s: props.m1s.value(),
            sig_m1s: props.m1s.std_dev(),
            m1e: props.m1e.value(),
            sig_m1e: props.m1e.std_dev(),
            m1: props.m1.value(),
            sig_m1: props.m1.std_dev(),
            rhos: props.rhos.value(),
            sig_rhos: props.rhos.std_dev(),
            rhoe: props.rhoe.value(),
            sig_rhoe: props.rhoe.std_dev(),
            rho: props.rho.value(),
            sig_rho: props.rho.std_dev(),
            bm1: props.bm1.value(),
            sig_bm1: props.bm1.std_dev(),
            t: props.t.value(),
            sig_t: props.t.std_dev(),
            d12: props.d12.value(),
            sig_d12: props.d12.std_dev(),
            hfg: props.hfg.value(),
            sig_hfg: props.hfg.std_dev(),
            hu: props.hu.value(),
            sig_hu: props.hu.std_dev(),
            hs: props.hs.value(),
            sig_hs: props.hs.std_dev(),
            cpv: props.cpv.value(),
            sig_cpv: props.cpv.std_dev(),
            he: props.he.value(),
            sig_he: props.he.std_dev(),
            cpl: props.cpl.value(),
            sig_cpl: props.cpl.std_dev(),
            ht: props.ht.value(),
            sig_ht: props.ht.std_dev(),
            qcu: props.qcu.value(),
            sig_qcu: props.qcu.std_dev(),
            ebe: props.ebe.value(),
            sig_ebe: props.ebe.std_dev(),
            ebs: props.ebs.value(),
            sig_ebs: props.ebs.std_dev(),
            qrs: props.qrs.value(),
            sig_qrs: props.qrs.std_dev(),
            kv: props.kv.value(),
            sig_kv: props.kv.std_dev(),
            alpha: props.alpha.value(),
            sig_alpha: props.alpha.std_dev(),
            bh: props.bh.value(),
            sig_bh: props.bh.std_dev(),
            m: props.m.value(),
            sig_m: props.m.std_dev(),
            gamma1: props.gamma1.value(),
            sig_gamma1: props.gamma1.std_dev(),
            gamma2: props.gamma2.value(),
            sig_gamma2: props.gamma2.std_dev(),
            beta: props.beta.value(),
            sig_beta: props.beta.std_dev(),
            delta_m: props.delta_m.value(),
            sig_delta_m: props.delta_m.std_dev(),
            delta_t: props.delta_t.value(),
            sig_delta_t: props.delta_t.std_dev(),
            mu: props.mu.value(),
            sig_mu: props.mu.std_dev(),
            nu: props.nu.value(),
            sig_nu: props.nu.std_dev(),
            sh_r: groups.sh_r.value(),
            sig_sh_r: groups.sh_r.std_dev(),
            nu_r: groups.nu_r.value(),
            sig_nu_r: groups.nu_r.std_dev(),
            le: groups.le.value(),
            sig_le: groups.le.std_dev(),
            gr_r_binary: groups.gr_r_binary.value(),
            sig_gr_r_binary: groups.gr_r_binary.std_dev(),
            gr_r_primary: groups.gr_r_primary.value(),
            sig_gr_r_primary: groups.gr_r_primary.std_dev(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::LinearFit;

    #[test]
    fn relative_slope_error_is_unsigned() {
        let fit = LinearFit {
            a: 0.1,
            sig_a: 1e-9,
            b: -5.0e-9,
            sig_b: 5.0e-11,
        };
        approx::assert_relative_eq!(fit.relative_slope_error(), 0.01, max_relative = 1e-12);
        approx::assert_relative_eq!(fit.slope().value(), -5.0e-9);
    }

    #[test]
    fn flat_lines_have_unbounded_relative_error() {
        let fit = LinearFit {
            a: 0.1,
            sig_a: 1e-9,
            b: 0.0,
            sig_b: 5.0e-11,
        };
        assert!(fit.relative_slope_error().is_infinite());
    }
}
