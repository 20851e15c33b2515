/*!
Control-word bits, the opcode table, and the per-opcode microcode table.

Overview
========
A `ControlWord` is a bitfield naming which micro-operations fire on a
given cycle. The canonical 29 bits from the reference hardware are
assigned bits 0..=28 below; `JNZ` and the two bits the extended register
family (opcodes 28..37) needs beyond the canonical set (`BO`, `SPI`) are
appended at bits 29..=31, keeping the field a plain `u32` (spec requires
width >= 29; 32 is the natural next step for a bitfield wider than one
byte).

`MICROCODE` is indexed by opcode byte and holds the ordered control words
executed from timestep T2 onward — T0 (`CO|MI`) and T1 (`RO|IAI|CE`) are
fixed fetch steps applied by the CPU core before consulting this table,
never stored here.

Extended opcode family (28..37)
================================
`spec.md` names `STB, MOVBA, MOVAB, LSP, MVASP, MVBSP, SUM, LAP, LPA, DIA`
but does not spell out each one's register-transfer semantics; the
opcode table names them collectively. This module fills them in from two
places spec.md pins down precisely:

- The Mini32 calling convention describes the exact sequence
  `PLA; MOVAB; PLA; STA .p_n; ...; PLA; STA .p_1; MOVBA; PHA`: the first
  `PLA` loads the return address into A, `MOVAB` must save it into B
  before the parameter `PLA`s clobber A, and `MOVBA` must restore it
  afterward. That fixes `MOVAB: B <- A` and `MOVBA: A <- B`.
- The peephole rule `STA .__tmp_addr; LPA .__tmp_addr -> STA .__tmp_addr;
  LAP` only makes sense if `LAP` dereferences A directly (the prior `STA`
  does not change A, so the two-step "store then load-through-pointer"
  and the one-step "dereference A" are the same operation). That fixes
  `LAP: A <- mem[A]` and, by the same family, `LPA addr: A <- mem[mem[addr]]`.

The remaining three (`STB`, `LSP`, `MVASP`, `MVBSP`, `SUM`, `DIA`) are
filled in symmetrically with already-specified opcodes of the same shape
(`STB` mirrors `LDB`; `MVASP`/`MVBSP` mirror `MOVAB`/`MOVBA` but target the
stack pointer; `SUM` exposes the adder's normal add path without an
operand, mirroring `LSA`'s `EO|AI|FI` pattern; `DIA` mirrors `LDD` but
targets `ScreenCtrl` instead of `ScreenData`, completing the
immediate/memory x data/control square that `DIS`/`DIC`/`LDD` already
form three corners of). See DESIGN.md for the full derivation.
*/

/// One bit position per named control signal.
pub mod bit {
    pub const HLT: u32 = 1 << 0;
    pub const MI: u32 = 1 << 1;
    pub const RI: u32 = 1 << 2;
    pub const RO: u32 = 1 << 3;
    pub const IAO: u32 = 1 << 4;
    pub const IAI: u32 = 1 << 5;
    pub const IBO: u32 = 1 << 6;
    pub const IBI: u32 = 1 << 7;
    pub const AI: u32 = 1 << 8;
    pub const AO: u32 = 1 << 9;
    pub const EO: u32 = 1 << 10;
    pub const SU: u32 = 1 << 11;
    pub const BI: u32 = 1 << 12;
    pub const OI: u32 = 1 << 13;
    pub const CE: u32 = 1 << 14;
    pub const CO: u32 = 1 << 15;
    pub const JMP: u32 = 1 << 16;
    pub const FI: u32 = 1 << 17;
    pub const JC: u32 = 1 << 18;
    pub const JZ: u32 = 1 << 19;
    pub const KEO: u32 = 1 << 20;
    pub const ORE: u32 = 1 << 21;
    pub const INS: u32 = 1 << 22;
    pub const DES: u32 = 1 << 23;
    pub const STO: u32 = 1 << 24;
    pub const RSA: u32 = 1 << 25;
    pub const LSA: u32 = 1 << 26;
    pub const DDI: u32 = 1 << 27;
    pub const DCI: u32 = 1 << 28;
    pub const JNZ: u32 = 1 << 29;
    /// Extended: B register onto the bus (STB).
    pub const BO: u32 = 1 << 30;
    /// Extended: bus loaded directly into the stack pointer (MVASP/MVBSP).
    pub const SPI: u32 = 1 << 31;
}

/// A bitfield of active micro-operations for one timestep.
pub type ControlWord = u32;

/// Output-enable precedence order for bus arbitration: the *last* bit in
/// this list that is asserted wins. Fixed per spec 4.C.
pub const BUS_PRECEDENCE: &[u32] = &[
    bit::IAO,
    bit::IBO,
    bit::RO,
    bit::AO,
    bit::KEO,
    bit::EO,
    bit::CO,
    bit::STO,
    bit::BO,
];

/// Fetch prologue, fixed for every opcode: T0 then T1.
pub const FETCH: [ControlWord; 2] = [bit::CO | bit::MI, bit::RO | bit::IAI | bit::CE];

/// One opcode's static metadata: mnemonic text, operand count, and whether
/// it is a control-flow instruction whose operand is an absolute code
/// address (relevant to the assembler's jump-operand handling and the
/// loader's relocation pass).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeInfo {
    pub mnemonic: &'static str,
    pub opcode: u8,
    pub operands: u8,
    pub is_jump: bool,
}

macro_rules! opcode_table {
    ($( $mnemonic:ident = $op:expr, $operands:expr, $is_jump:expr; )*) => {
        pub const OPCODES: &[OpcodeInfo] = &[
            $( OpcodeInfo { mnemonic: stringify!($mnemonic), opcode: $op, operands: $operands, is_jump: $is_jump }, )*
        ];
    };
}

opcode_table! {
    NOP = 0, 0, false;
    LDA = 1, 1, false;
    ADD = 2, 1, false;
    SUB = 3, 1, false;
    STA = 4, 1, false;
    LDI = 5, 1, false;
    JMP = 6, 1, true;
    JPC = 7, 1, true;
    JPZ = 8, 1, true;
    KEI = 9, 0, false;
    ADI = 10, 1, false;
    SUI = 11, 1, false;
    CMP = 12, 1, false;
    PHA = 13, 0, false;
    PLA = 14, 0, false;
    LDS = 15, 0, false;
    JSR = 16, 1, true;
    RET = 17, 0, true;
    SAS = 18, 0, false;
    LAS = 19, 0, false;
    LDB = 20, 1, false;
    CPI = 21, 1, false;
    RSA = 22, 0, false;
    LSA = 23, 0, false;
    DIS = 24, 1, false;
    DIC = 25, 1, false;
    LDD = 26, 1, false;
    JNZ = 27, 1, true;
    STB = 28, 1, false;
    MOVBA = 29, 0, false;
    MOVAB = 30, 0, false;
    LSP = 31, 0, false;
    MVASP = 32, 0, false;
    MVBSP = 33, 0, false;
    SUM = 34, 0, false;
    LAP = 35, 0, false;
    LPA = 36, 1, false;
    DIA = 37, 1, false;
    OUT = 254, 0, false;
    HLT = 255, 0, false;
}

/// Looks up opcode metadata by mnemonic (case-sensitive, as written in source).
pub fn lookup_mnemonic(mnemonic: &str) -> Option<&'static OpcodeInfo> {
    OPCODES.iter().find(|o| o.mnemonic == mnemonic)
}

/// Looks up opcode metadata by numeric opcode.
pub fn lookup_opcode(opcode: u8) -> Option<&'static OpcodeInfo> {
    OPCODES.iter().find(|o| o.opcode == opcode)
}

/// Returns the microcode body (timesteps from T2 onward) for `opcode`.
/// Undefined opcodes return an empty body: the CPU re-fetches on the next
/// cycle, which is non-fatal by design (spec 4.E, 9).
pub fn microcode_for(opcode: u8) -> &'static [ControlWord] {
    use bit::*;
    match opcode {
        0 => &[ORE], // NOP
        1 => &[CO | MI, RO | MI | CE, RO | AI | ORE], // LDA: A <- mem[op]
        2 => &[CO | MI, RO | MI | CE, RO | BI, EO | AI | FI | ORE], // ADD
        3 => &[CO | MI, RO | MI | CE, RO | BI, EO | AI | FI | SU | ORE], // SUB
        4 => &[CO | MI, RO | MI | CE, AO | RI | ORE], // STA: mem[op] <- A
        5 => &[CO | MI, RO | AI | CE | ORE], // LDI: A <- op
        6 => &[CO | MI, RO | JMP | CE | ORE], // JMP
        7 => &[CO | MI, RO | JC | CE | ORE], // JPC
        8 => &[CO | MI, RO | JZ | CE | ORE], // JPZ
        9 => &[KEO | AI | ORE], // KEI
        10 => &[CO | MI, RO | BI | CE, EO | AI | FI | ORE], // ADI
        11 => &[CO | MI, RO | BI | CE, EO | AI | FI | SU | ORE], // SUI
        12 => &[CO | MI, RO | MI | CE, RO | BI, FI | SU | ORE], // CMP
        13 => &[STO | MI, AO | RI | INS | ORE], // PHA
        14 => &[DES, STO | MI, AI | RO | ORE], // PLA
        15 => &[STO | AI | ORE], // LDS
        16 => &[CO | MI, RO | IBI | CE, STO | MI, CO | RI | INS, IBO | JMP | ORE], // JSR
        17 => &[DES, STO | MI, RO | JMP | ORE], // RET
        18 => &[DES, STO | MI, RO | MI, AO | RI | ORE], // SAS
        19 => &[DES, STO | MI, RO | MI, AI | RO | ORE], // LAS
        20 => &[CO | MI, RO | MI | CE, RO | BI | ORE], // LDB
        21 => &[CO | MI, RO | BI | CE, FI | SU | ORE], // CPI
        22 => &[RSA | ORE], // RSA: A <- A >> 1, direct path, no flags
        23 => &[LSA | FI | ORE], // LSA: A <- A + A, direct path, flags set
        24 => &[CO | MI, RO | IBI | CE, IBO | DDI | ORE], // DIS
        25 => &[CO | MI, RO | IBI | CE, IBO | DCI | ORE], // DIC
        26 => &[CO | MI, RO | IBI | CE, IBO | MI, RO | DDI | ORE], // LDD
        27 => &[CO | MI, RO | JNZ | CE | ORE], // JNZ
        28 => &[CO | MI, RO | MI | CE, BO | RI | ORE], // STB: mem[op] <- B
        29 => &[BO | AI | ORE], // MOVBA: A <- B
        30 => &[AO | BI | ORE], // MOVAB: B <- A
        31 => &[STO | MI, RO | AI | ORE], // LSP: A <- mem[SP + stackpointer_start] (peek, no pop)
        32 => &[AO | SPI | ORE], // MVASP: SP <- A
        33 => &[BO | SPI | ORE], // MVBSP: SP <- B
        34 => &[EO | AI | FI | ORE], // SUM: A <- A + B, set flags
        35 => &[AO | MI, RO | AI | ORE], // LAP: A <- mem[A]
        36 => &[CO | MI, RO | MI | CE, RO | MI, RO | AI | ORE], // LPA addr: A <- mem[mem[addr]]
        37 => &[CO | MI, RO | IBI | CE, IBO | MI, RO | DCI | ORE], // DIA: ScreenCtrl <- top 3 bits of mem[op]
        254 => &[AO | OI | ORE], // OUT
        255 => &[HLT], // HLT
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_defined_opcode_ends_with_ore_or_hlt() {
        for info in OPCODES {
            let body = microcode_for(info.opcode);
            let last = *body.last().expect("opcode body must not be empty");
            assert!(
                last & bit::ORE != 0 || last & bit::HLT != 0,
                "{} (opcode {}) does not terminate with ORE or HLT",
                info.mnemonic,
                info.opcode
            );
        }
    }

    #[test]
    fn undefined_opcode_has_empty_body() {
        assert!(microcode_for(200).is_empty());
    }

    #[test]
    fn mnemonic_lookup_round_trips_opcode() {
        let info = lookup_mnemonic("JSR").unwrap();
        assert_eq!(info.opcode, 16);
        assert!(info.is_jump);
        assert_eq!(lookup_opcode(16).unwrap().mnemonic, "JSR");
    }
}
