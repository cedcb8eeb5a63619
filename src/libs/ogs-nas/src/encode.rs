//! Plain EMM message encoding (TS 24.301 8.2)
//!
//! Produces the unprotected octets of a downlink EMM message into a
//! [`NasBuffer`] with [`NAS_HEADROOM`] reserved, so the security layer can
//! prepend its header in place.

use crate::error::{NasError, NasResult};
use crate::message::{
    AttachAccept, AuthenticationRequest, EmmInformation, EmmMessage, IdentityRequest,
    SecurityModeCommand,
};
use crate::pkbuf::{NasBuffer, NAS_HEADROOM};
use crate::types::{protocol_discriminator, EpsGuti, EpsTai};

const IEI_GUTI: u8 = 0x50;
const IEI_UNIVERSAL_TIME_AND_LOCAL_TIME_ZONE: u8 = 0x47;
const IEI_NETWORK_DAYLIGHT_SAVING_TIME: u8 = 0x49;

/// Maximum number of elements in one partial TAI list
const MAX_TAI_ELEMENTS: usize = 16;

trait NasBufferExt {
    fn put_lv(&mut self, name: &'static str, value: &[u8]) -> NasResult<()>;
    fn put_lv_e(&mut self, name: &'static str, value: &[u8]) -> NasResult<()>;
}

impl NasBufferExt for NasBuffer {
    fn put_lv(&mut self, name: &'static str, value: &[u8]) -> NasResult<()> {
        let len = u8::try_from(value.len())
            .map_err(|_| NasError::IeTooLong { name, len: value.len() })?;
        self.put_u8(len);
        self.put_data(value);
        Ok(())
    }

    fn put_lv_e(&mut self, name: &'static str, value: &[u8]) -> NasResult<()> {
        let len = u16::try_from(value.len())
            .map_err(|_| NasError::IeTooLong { name, len: value.len() })?;
        self.put_u16(len);
        self.put_data(value);
        Ok(())
    }
}

/// Encode an EMM message as a plain NAS message.
///
/// Uplink-only messages return [`NasError::UnsupportedEncode`].
pub fn encode_emm_message(msg: &EmmMessage) -> NasResult<NasBuffer> {
    let mut buf = NasBuffer::with_headroom(NAS_HEADROOM, 64);

    // Plain header: security header type 0 | EMM
    buf.put_u8(protocol_discriminator::EMM);
    buf.put_u8(msg.message_type() as u8);

    match msg {
        EmmMessage::IdentityRequest(m) => encode_identity_request(&mut buf, m),
        EmmMessage::AuthenticationRequest(m) => encode_authentication_request(&mut buf, m),
        EmmMessage::SecurityModeCommand(m) => encode_security_mode_command(&mut buf, m)?,
        EmmMessage::AttachAccept(m) => encode_attach_accept(&mut buf, m)?,
        EmmMessage::EmmInformation(m) => encode_emm_information(&mut buf, m),
        EmmMessage::EmmStatus(m) => buf.put_u8(m.emm_cause),
        EmmMessage::DetachAccept => {}
        EmmMessage::AttachRequest(_)
        | EmmMessage::AttachComplete(_)
        | EmmMessage::IdentityResponse(_)
        | EmmMessage::AuthenticationResponse(_)
        | EmmMessage::DetachRequest(_) => {
            return Err(NasError::UnsupportedEncode(msg.message_type() as u8));
        }
    }

    Ok(buf)
}

fn encode_identity_request(buf: &mut NasBuffer, m: &IdentityRequest) {
    // spare half octet | identity type 2
    buf.put_u8(m.identity_type as u8 & 0x07);
}

fn encode_authentication_request(buf: &mut NasBuffer, m: &AuthenticationRequest) {
    // spare half octet | NAS key set identifier
    buf.put_u8(m.nas_key_set_identifier.to_nibble());
    buf.put_data(&m.rand);
    buf.put_u8(m.autn.len() as u8);
    buf.put_data(&m.autn);
}

fn encode_security_mode_command(buf: &mut NasBuffer, m: &SecurityModeCommand) -> NasResult<()> {
    buf.put_u8(m.selected_nas_security_algorithms.to_byte());
    buf.put_u8(m.nas_key_set_identifier.to_nibble());

    let caps = &m.replayed_ue_security_capabilities;
    let octets = [caps.eea, caps.eia, caps.uea, caps.uia, caps.gea];
    let len = (caps.length as usize).min(octets.len());
    buf.put_lv("replayed UE security capabilities", &octets[..len])
}

fn encode_attach_accept(buf: &mut NasBuffer, m: &AttachAccept) -> NasResult<()> {
    // spare half octet | EPS attach result
    buf.put_u8(m.eps_attach_result & 0x07);
    buf.put_u8(m.t3412_value.to_byte());
    buf.put_lv("TAI list", &encode_tai_list(&m.tai_list))?;
    buf.put_lv_e("ESM message container", &m.esm_message_container.buffer)?;

    if let Some(guti) = &m.guti {
        buf.put_u8(IEI_GUTI);
        buf.put_lv("GUTI", &encode_guti(guti))?;
    }
    Ok(())
}

fn encode_emm_information(buf: &mut NasBuffer, m: &EmmInformation) {
    if let Some(time) = &m.universal_time_and_local_time_zone {
        buf.put_u8(IEI_UNIVERSAL_TIME_AND_LOCAL_TIME_ZONE);
        buf.put_data(&time.to_bytes());
    }
    if let Some(dst) = m.network_daylight_saving_time {
        buf.put_u8(IEI_NETWORK_DAYLIGHT_SAVING_TIME);
        buf.put_u8(1);
        buf.put_u8(dst & 0x03);
    }
}

/// Encode a tracking area identity list (TS 24.301 9.9.3.33).
///
/// A list sharing one PLMN uses type 0 (non-consecutive TACs); a mixed list
/// uses type 2 (list of TAIs).
pub fn encode_tai_list(tai_list: &[EpsTai]) -> Vec<u8> {
    let tais = &tai_list[..tai_list.len().min(MAX_TAI_ELEMENTS)];
    let Some(first) = tais.first() else {
        return Vec::new();
    };

    let count = (tais.len() - 1) as u8;
    let mut out = Vec::with_capacity(1 + tais.len() * 5);
    if tais.iter().all(|tai| tai.plmn_id == first.plmn_id) {
        out.push(count);
        out.extend_from_slice(&first.plmn_id.to_bytes());
        for tai in tais {
            out.extend_from_slice(&tai.tac.to_be_bytes());
        }
    } else {
        out.push(0x40 | count);
        for tai in tais {
            out.extend_from_slice(&tai.plmn_id.to_bytes());
            out.extend_from_slice(&tai.tac.to_be_bytes());
        }
    }
    out
}

/// Encode an EPS mobile identity carrying a GUTI (11 octets).
pub fn encode_guti(guti: &EpsGuti) -> [u8; 11] {
    let mut out = [0u8; 11];
    // 1111 | even | type GUTI
    out[0] = 0xf0 | crate::identity::IdentityType::Guti as u8;
    out[1..4].copy_from_slice(&guti.plmn_id.to_bytes());
    out[4..6].copy_from_slice(&guti.mme_gid.to_be_bytes());
    out[6] = guti.mme_code;
    out[7..11].copy_from_slice(&guti.m_tmsi.to_be_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityType;
    use crate::message::{AuthenticationResponse, EmmStatus};
    use crate::types::*;

    fn home_plmn() -> PlmnId {
        PlmnId::from_digits("001", "01").unwrap()
    }

    #[test]
    fn test_encode_identity_request() {
        let msg = EmmMessage::IdentityRequest(IdentityRequest { identity_type: IdentityType::Imsi });
        let buf = encode_emm_message(&msg).unwrap();
        assert_eq!(buf.data(), &[0x07, 0x55, 0x01]);
        assert_eq!(buf.headroom(), NAS_HEADROOM);
    }

    #[test]
    fn test_encode_authentication_request() {
        let msg = EmmMessage::AuthenticationRequest(AuthenticationRequest {
            nas_key_set_identifier: KeySetIdentifier::new(0, 0),
            rand: [0x11; 16],
            autn: [0x22; 16],
        });
        let buf = encode_emm_message(&msg).unwrap();
        let data = buf.data();
        assert_eq!(data.len(), 3 + 16 + 1 + 16);
        assert_eq!(&data[..3], &[0x07, 0x52, 0x00]);
        assert_eq!(&data[3..19], &[0x11; 16]);
        assert_eq!(data[19], 0x10);
        assert_eq!(&data[20..], &[0x22; 16]);
    }

    #[test]
    fn test_encode_security_mode_command() {
        let msg = EmmMessage::SecurityModeCommand(SecurityModeCommand {
            selected_nas_security_algorithms: SecurityAlgorithms { ciphering: 0, integrity: 2 },
            nas_key_set_identifier: KeySetIdentifier::new(0, 0),
            replayed_ue_security_capabilities: UeSecurityCapability {
                length: 5,
                eea: 0xe0,
                eia: 0x60,
                uea: 0,
                uia: 0,
                gea: 0x7f,
            },
        });
        let buf = encode_emm_message(&msg).unwrap();
        assert_eq!(buf.data(), &[0x07, 0x5d, 0x02, 0x00, 0x05, 0xe0, 0x60, 0x00, 0x00, 0x7f]);
    }

    #[test]
    fn test_encode_attach_accept() {
        let plmn = home_plmn();
        let msg = EmmMessage::AttachAccept(AttachAccept {
            eps_attach_result: crate::message::eps_attach_result::EPS_ONLY,
            t3412_value: GprsTimer::from_seconds(540),
            tai_list: vec![EpsTai { plmn_id: plmn, tac: 0x0001 }],
            esm_message_container: EsmMessageContainer::new(vec![0x52, 0x01, 0xc1]),
            guti: Some(EpsGuti { plmn_id: plmn, mme_gid: 2, mme_code: 1, m_tmsi: 0xc0000001 }),
        });
        let buf = encode_emm_message(&msg).unwrap();
        assert_eq!(
            buf.data(),
            &[
                0x07, 0x42, 0x01, 0x29,
                0x06, 0x00, 0x00, 0xf1, 0x10, 0x00, 0x01,
                0x00, 0x03, 0x52, 0x01, 0xc1,
                0x50, 0x0b, 0xf6, 0x00, 0xf1, 0x10, 0x00, 0x02, 0x01, 0xc0, 0x00, 0x00, 0x01,
            ]
        );
    }

    #[test]
    fn test_encode_emm_information() {
        let msg = EmmMessage::EmmInformation(EmmInformation {
            universal_time_and_local_time_zone: Some(TimeZoneAndTime::new(24, 3, 15, 9, 5, 42, 0)),
            network_daylight_saving_time: Some(0),
        });
        let buf = encode_emm_message(&msg).unwrap();
        assert_eq!(
            buf.data(),
            &[0x07, 0x61, 0x47, 0x42, 0x30, 0x51, 0x90, 0x50, 0x24, 0x00, 0x49, 0x01, 0x00]
        );
    }

    #[test]
    fn test_encode_detach_accept_and_status() {
        assert_eq!(encode_emm_message(&EmmMessage::DetachAccept).unwrap().data(), &[0x07, 0x46]);
        let status = EmmMessage::EmmStatus(EmmStatus { emm_cause: 0x62 });
        assert_eq!(encode_emm_message(&status).unwrap().data(), &[0x07, 0x60, 0x62]);
    }

    #[test]
    fn test_encode_uplink_message_rejected() {
        let msg = EmmMessage::AuthenticationResponse(AuthenticationResponse { res: vec![0; 8] });
        assert_eq!(encode_emm_message(&msg).unwrap_err(), NasError::UnsupportedEncode(0x53));
    }

    #[test]
    fn test_encode_tai_list_mixed_plmn() {
        let other = PlmnId::from_digits("310", "410").unwrap();
        let list = encode_tai_list(&[
            EpsTai { plmn_id: home_plmn(), tac: 1 },
            EpsTai { plmn_id: other, tac: 2 },
        ]);
        assert_eq!(list[0], 0x41);
        assert_eq!(list.len(), 1 + 2 * 5);
        assert!(encode_tai_list(&[]).is_empty());
    }
}
